//! Staged message construction, mirroring the method-chained builder
//! convention used for outbound responses in the teacher's routing layer.
//!
//! `build()` enforces the mandatory attachment order from `SPEC_FULL.md`
//! Section 4.3: `MESSAGE-INTEGRITY`, then `MESSAGE-INTEGRITY-SHA256`, then
//! `FINGERPRINT`.

use rand::Rng;

use crate::error::BuildError;
use crate::message::attributes::{Attribute, AttributeType};
use crate::message::methods::{Class, Method};
use crate::message::{Message, RawAttribute};

#[derive(Debug, Default)]
pub struct MessageBuilder {
    class: Option<Class>,
    method: Option<Method>,
    transaction_id: Option<[u8; 12]>,
    attributes: Vec<RawAttribute>,
    integrity_key: Option<Vec<u8>>,
    integrity_sha256_key: Option<Vec<u8>>,
    fingerprint: bool,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_class(mut self, class: Class) -> Self {
        self.class = Some(class);
        self
    }

    pub fn set_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn set_transaction_id(mut self, transaction_id: [u8; 12]) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub fn random_transaction_id(mut self) -> Self {
        let mut transaction_id = [0u8; 12];
        rand::rng().fill(&mut transaction_id);
        self.transaction_id = Some(transaction_id);
        self
    }

    /// Append a typed attribute. The transaction id must already be set
    /// since `XOR-MAPPED-ADDRESS`-style attributes fold it into their wire
    /// value.
    pub fn add_attribute<A: Attribute>(mut self, value: &A::Item) -> Self {
        let transaction_id = self.transaction_id.unwrap_or([0u8; 12]);
        let mut encoded = Vec::new();
        A::encode(value, &transaction_id, &mut encoded);
        self.attributes.push(RawAttribute {
            ty: u16::from(A::TYPE),
            value: encoded,
        });
        self
    }

    pub fn add_message_integrity(mut self, key: Vec<u8>) -> Self {
        self.integrity_key = Some(key);
        self
    }

    pub fn add_message_integrity_sha256(mut self, key: Vec<u8>) -> Self {
        self.integrity_sha256_key = Some(key);
        self
    }

    pub fn add_fingerprint(mut self) -> Self {
        self.fingerprint = true;
        self
    }

    pub fn build(self) -> Result<Message, BuildError> {
        let class = self.class.ok_or(BuildError::InvalidMessage)?;
        let method = self.method.ok_or(BuildError::InvalidMessage)?;
        let transaction_id = self.transaction_id.ok_or(BuildError::InvalidMessage)?;

        let mut message = Message {
            class,
            method,
            transaction_id,
            attributes: self.attributes,
        };

        if let Some(key) = self.integrity_key {
            let digest = message.compute_message_integrity_over(&message.attributes, &key);
            message.attributes.push(RawAttribute {
                ty: u16::from(AttributeType::MessageIntegrity),
                value: digest.to_vec(),
            });
        }

        if let Some(key) = self.integrity_sha256_key {
            let digest = message.compute_message_integrity_sha256_over(&message.attributes, &key);
            message.attributes.push(RawAttribute {
                ty: u16::from(AttributeType::MessageIntegritySha256),
                value: digest.to_vec(),
            });
        }

        if self.fingerprint {
            let value = message.compute_fingerprint_over(&message.attributes);
            message.attributes.push(RawAttribute {
                ty: u16::from(AttributeType::Fingerprint),
                value: value.to_be_bytes().to_vec(),
            });
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::attributes::UserName;

    #[test]
    fn rejects_an_incomplete_message() {
        let result = MessageBuilder::new().set_class(Class::Request).build();
        assert!(matches!(result, Err(BuildError::InvalidMessage)));
    }

    #[test]
    fn fingerprint_is_the_final_attribute() {
        let message = MessageBuilder::new()
            .set_class(Class::Request)
            .set_method(Method::Binding)
            .set_transaction_id([0u8; 12])
            .add_attribute::<UserName>(&"corendos".to_string())
            .add_fingerprint()
            .build()
            .unwrap();

        assert_eq!(message.attributes.last().unwrap().ty, u16::from(AttributeType::Fingerprint));
        assert!(message.check_fingerprint());
    }

    #[test]
    fn integrity_verifies_with_the_matching_key_only() {
        let key = b"password".to_vec();
        let message = MessageBuilder::new()
            .set_class(Class::Request)
            .set_method(Method::Binding)
            .set_transaction_id([0u8; 12])
            .add_message_integrity(key.clone())
            .build()
            .unwrap();

        assert!(message.check_message_integrity(&key));
        assert!(!message.check_message_integrity(b"wrong"));
    }
}
