use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use stun_core::message::attributes::{Software, UserName};
use stun_core::message::builder::MessageBuilder;
use stun_core::message::methods::{Class, Method};
use stun_core::Message;

fn sample_binding_request() -> Vec<u8> {
    let message = MessageBuilder::new()
        .set_class(Class::Request)
        .set_method(Method::Binding)
        .random_transaction_id()
        .add_attribute::<UserName>(&"corendos".to_string())
        .add_attribute::<Software>(&"stun-core v0.1.0".to_string())
        .add_fingerprint()
        .build()
        .unwrap();

    let mut bytes = Vec::new();
    message.write(&mut bytes).unwrap();
    bytes
}

fn criterion_benchmark(c: &mut Criterion) {
    let sample = sample_binding_request();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));
    group.bench_function("decode_binding_request", |bencher| {
        bencher.iter(|| {
            Message::read(&mut sample.as_slice()).unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
