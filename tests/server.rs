//! End-to-end server scenarios driven entirely through the public API:
//! a client builds a request, the server answers, the client reacts to
//! the challenge and retries, mirroring how a real caller would drive
//! `Server::handle_message` across a short negotiation.

use anyhow::Result;

use stun_core::auth::Credential;
use stun_core::crypto::long_term_key;
use stun_core::message::attributes::{
    AttributeType, NonceAttr, Realm, UserName, XorMappedAddress,
};
use stun_core::message::builder::MessageBuilder;
use stun_core::message::methods::{Class, Method};
use stun_core::server::AuthenticationType;
use stun_core::{MessageResult, Server, ServerOptions};

fn client_addr() -> std::net::SocketAddr {
    "198.51.100.9:4096".parse().unwrap()
}

#[test]
fn unauthenticated_server_answers_binding_requests() -> Result<()> {
    let mut server = Server::new(ServerOptions::default());

    let request = MessageBuilder::new()
        .set_class(Class::Request)
        .set_method(Method::Binding)
        .random_transaction_id()
        .add_fingerprint()
        .build()?;

    let source = client_addr();
    match server.handle_message(&request, source) {
        MessageResult::Response(response) => {
            assert_eq!(response.class, Class::SuccessResponse);
            assert_eq!(response.get::<XorMappedAddress>(), Some(source));
        }
        other => panic!("expected a response, got {other:?}"),
    }
    Ok(())
}

#[test]
fn long_term_negotiation_succeeds_after_the_initial_challenge() -> Result<()> {
    let mut server = Server::new(ServerOptions {
        authentication_type: AuthenticationType::LongTerm,
        realm: "example.org".into(),
        ..Default::default()
    });
    server.register_user(
        "corendos",
        Credential::LongTerm {
            username: "corendos".into(),
            realm: "example.org".into(),
            password: "hunter2".into(),
        },
    );

    let source = client_addr();

    // Round 1: bare request, expect a 401 challenge carrying a realm and nonce.
    let bare_request = MessageBuilder::new()
        .set_class(Class::Request)
        .set_method(Method::Binding)
        .random_transaction_id()
        .build()?;

    let challenge = match server.handle_message(&bare_request, source) {
        MessageResult::Response(response) => response,
        other => panic!("expected a challenge response, got {other:?}"),
    };
    assert_eq!(challenge.class, Class::ErrorResponse);
    let realm = challenge.get::<Realm>().expect("realm present in challenge");
    let nonce = challenge.get::<NonceAttr>().expect("nonce present in challenge");
    assert_eq!(realm, "example.org");

    // Round 2: retry with the offered nonce and a correctly derived key.
    let key = long_term_key("corendos", &realm, "hunter2").to_vec();
    let authenticated_request = MessageBuilder::new()
        .set_class(Class::Request)
        .set_method(Method::Binding)
        .random_transaction_id()
        .add_attribute::<UserName>(&"corendos".to_string())
        .add_attribute::<Realm>(&realm)
        .add_attribute::<NonceAttr>(&nonce)
        .add_message_integrity(key)
        .build()?;

    match server.handle_message(&authenticated_request, source) {
        MessageResult::Response(response) => {
            assert_eq!(response.class, Class::SuccessResponse);
            assert!(response.has(AttributeType::MessageIntegrity));
            assert_eq!(response.get::<XorMappedAddress>(), Some(source));
        }
        other => panic!("expected a success response, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_comprehension_required_attribute_is_rejected() -> Result<()> {
    let mut server = Server::new(ServerOptions::default());

    let mut request = MessageBuilder::new()
        .set_class(Class::Request)
        .set_method(Method::Binding)
        .random_transaction_id()
        .build()?;
    request.attributes.push(stun_core::message::RawAttribute {
        ty: 0x0002, // RESPONSE-ADDRESS: comprehension-required, not implemented here
        value: vec![0, 0, 0, 0],
    });

    match server.handle_message(&request, client_addr()) {
        MessageResult::Response(response) => {
            let error = response
                .get::<stun_core::message::attributes::ErrorCodeAttr>()
                .expect("error code present");
            assert_eq!(error.code, 420);
        }
        other => panic!("expected a response, got {other:?}"),
    }
    Ok(())
}

#[test]
fn tampered_fingerprint_is_silently_discarded() -> Result<()> {
    let mut server = Server::new(ServerOptions::default());

    let mut request = MessageBuilder::new()
        .set_class(Class::Request)
        .set_method(Method::Binding)
        .random_transaction_id()
        .add_fingerprint()
        .build()?;
    let last = request.attributes.last_mut().unwrap();
    last.value[0] ^= 0xFF;

    assert_eq!(
        server.handle_message(&request, client_addr()),
        MessageResult::Discard
    );
    Ok(())
}
