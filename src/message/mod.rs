//! ## Session Traversal Utilities for NAT (STUN)
//!
//! [RFC8489]: https://tools.ietf.org/html/rfc8489
//!
//! A STUN message is a 20-byte header followed by a sequence of
//! type-length-value attributes padded to 4-byte boundaries. This module
//! frames that header, tracks the raw attribute list, and computes the two
//! integrity mechanisms ([RFC8489] Section 14.5/14.6) over a synthetic
//! prefix whose length field is retroactively patched to the size the
//! message will have once the not-yet-appended attribute is included.

pub mod attributes;
pub mod builder;
pub mod methods;

use std::io::{Read, Write};

use attributes::{Attribute, AttributeType};
use methods::{decode_message_type, encode_message_type, Class, Method};

use crate::error::DecodeError;

const MAGIC_NUMBER: u32 = 0x2112_A442;

/// Pad a TLV value length up to the next 4-byte boundary.
pub(crate) fn alignment_32(size: usize) -> usize {
    (size + 3) & !3
}

/// An attribute as it exists on or off the wire: a 16-bit type and its raw
/// value bytes (padding excluded). Typed access goes through [`Attribute`]
/// implementations; anything not in the registry simply carries its type
/// and bytes unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub ty: u16,
    pub value: Vec<u8>,
}

fn serialize_attribute(ty: u16, value: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&ty.to_be_bytes());
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    let pad = alignment_32(value.len()) - value.len();
    out.extend(std::iter::repeat(0u8).take(pad));
}

fn attributes_wire_len(attrs: &[RawAttribute]) -> usize {
    attrs.iter().map(|a| 4 + alignment_32(a.value.len())).sum()
}

fn encode_header(class: Class, method: Method, transaction_id: &[u8; 12], length: u16, out: &mut Vec<u8>) {
    out.extend_from_slice(&encode_message_type(method, class).to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&MAGIC_NUMBER.to_be_bytes());
    out.extend_from_slice(transaction_id);
}

/// Serialize `class`/`method`/`transaction_id` plus `attrs`, with the header
/// `length` field overridden to `length_override` instead of the true size
/// of `attrs`: the "length pre-inflation" the integrity and fingerprint
/// computations rely on.
fn encode_prefix(
    class: Class,
    method: Method,
    transaction_id: &[u8; 12],
    attrs: &[RawAttribute],
    length_override: u16,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(20 + attributes_wire_len(attrs));
    encode_header(class, method, transaction_id, length_override, &mut out);
    for attr in attrs {
        serialize_attribute(attr.ty, &attr.value, &mut out);
    }
    out
}

/// A decoded (or to-be-built) STUN message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub class: Class,
    pub method: Method,
    pub transaction_id: [u8; 12],
    pub attributes: Vec<RawAttribute>,
}

impl Message {
    /// Look up and decode the first attribute of type `A`.
    pub fn get<A: Attribute>(&self) -> Option<A::Item> {
        let ty = u16::from(A::TYPE);
        self.attributes
            .iter()
            .find(|a| a.ty == ty)
            .and_then(|a| A::decode(&a.value, &self.transaction_id).ok())
    }

    /// Whether an attribute of type `A` is present, independent of whether
    /// it parses.
    pub fn has(&self, ty: AttributeType) -> bool {
        let ty = u16::from(ty);
        self.attributes.iter().any(|a| a.ty == ty)
    }

    fn index_of(&self, ty: AttributeType) -> Option<usize> {
        let ty = u16::from(ty);
        self.attributes.iter().position(|a| a.ty == ty)
    }

    /// Decode a message from a byte-oriented reader.
    ///
    /// See [RFC8489 Section 5] for the header bit layout this mirrors.
    ///
    /// [RFC8489 Section 5]: https://tools.ietf.org/html/rfc8489#section-5
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut header = [0u8; 20];
        reader
            .read_exact(&mut header)
            .map_err(|_| DecodeError::EndOfStream)?;

        let raw_type = u16::from_be_bytes([header[0], header[1]]);
        if raw_type & 0xc000 != 0 {
            return Err(DecodeError::NonZeroStartingBits);
        }

        let (method, class) = decode_message_type(raw_type)?;
        let length = u16::from_be_bytes([header[2], header[3]]) as usize;

        let magic = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if magic != MAGIC_NUMBER {
            return Err(DecodeError::WrongMagicCookie);
        }

        let mut transaction_id = [0u8; 12];
        transaction_id.copy_from_slice(&header[8..20]);

        let mut body = vec![0u8; length];
        reader
            .read_exact(&mut body)
            .map_err(|_| DecodeError::EndOfStream)?;

        let mut attributes = Vec::new();
        let mut cursor = body.as_slice();
        while !cursor.is_empty() {
            if cursor.len() < 4 {
                return Err(DecodeError::EndOfStream);
            }
            let ty = u16::from_be_bytes([cursor[0], cursor[1]]);
            let value_len = u16::from_be_bytes([cursor[2], cursor[3]]) as usize;
            let padded = alignment_32(value_len);
            if cursor.len() < 4 + padded {
                return Err(DecodeError::EndOfStream);
            }

            let value = cursor[4..4 + value_len].to_vec();
            attributes.push(RawAttribute { ty, value });
            cursor = &cursor[4 + padded..];
        }

        Ok(Self {
            class,
            method,
            transaction_id,
            attributes,
        })
    }

    /// Serialize the message, attributes in list order, to a byte-oriented
    /// writer. Inverse of [`Message::read`].
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), DecodeError> {
        let length = attributes_wire_len(&self.attributes) as u16;
        let bytes = encode_prefix(self.class, self.method, &self.transaction_id, &self.attributes, length);
        writer.write_all(&bytes).map_err(|_| DecodeError::OutOfMemory)
    }

    /// CRC32 fingerprint as if `FINGERPRINT` (8 bytes on the wire) were
    /// appended after `attrs`, without actually appending it.
    fn compute_fingerprint_over(&self, attrs: &[RawAttribute]) -> u32 {
        let length = (attributes_wire_len(attrs) + 8) as u16;
        let prefix = encode_prefix(self.class, self.method, &self.transaction_id, attrs, length);
        crate::crypto::fingerprint(&prefix)
    }

    /// Verify a decoded message's trailing `FINGERPRINT` attribute, if any.
    /// Returns `true` when there's no `FINGERPRINT` attribute to check.
    pub fn check_fingerprint(&self) -> bool {
        let Some(index) = self.index_of(AttributeType::Fingerprint) else {
            return true;
        };
        let expected = match self.get::<attributes::Fingerprint>() {
            Some(value) => value,
            None => return false,
        };
        self.compute_fingerprint_over(&self.attributes[..index]) == expected
    }

    /// HMAC-SHA1 `MESSAGE-INTEGRITY` as if the attribute (24 bytes on the
    /// wire) were appended after `attrs`, without actually appending it.
    fn compute_message_integrity_over(&self, attrs: &[RawAttribute], key: &[u8]) -> [u8; 20] {
        let length = (attributes_wire_len(attrs) + 24) as u16;
        let prefix = encode_prefix(self.class, self.method, &self.transaction_id, attrs, length);
        crate::crypto::hmac_sha1(key, &prefix)
    }

    /// HMAC-SHA256 `MESSAGE-INTEGRITY-SHA256` as if the attribute (36 bytes
    /// on the wire) were appended after `attrs`, without actually appending
    /// it.
    fn compute_message_integrity_sha256_over(&self, attrs: &[RawAttribute], key: &[u8]) -> [u8; 32] {
        let length = (attributes_wire_len(attrs) + 36) as u16;
        let prefix = encode_prefix(self.class, self.method, &self.transaction_id, attrs, length);
        crate::crypto::hmac_sha256(key, &prefix)
    }

    /// Verify a decoded message's `MESSAGE-INTEGRITY` attribute against `key`.
    /// Returns `false` if the attribute is absent.
    pub fn check_message_integrity(&self, key: &[u8]) -> bool {
        let Some(index) = self.index_of(AttributeType::MessageIntegrity) else {
            return false;
        };
        let Some(stored) = self.get::<attributes::MessageIntegrity>() else {
            return false;
        };
        self.compute_message_integrity_over(&self.attributes[..index], key) == stored
    }

    /// Verify a decoded message's `MESSAGE-INTEGRITY-SHA256` attribute
    /// against `key`. Returns `false` if the attribute is absent.
    pub fn check_message_integrity_sha256(&self, key: &[u8]) -> bool {
        let Some(index) = self.index_of(AttributeType::MessageIntegritySha256) else {
            return false;
        };
        let Some(stored) = self.get::<attributes::MessageIntegritySha256>() else {
            return false;
        };
        self.compute_message_integrity_sha256_over(&self.attributes[..index], key) == stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_binding_request() -> Message {
        Message {
            class: Class::Request,
            method: Method::Binding,
            transaction_id: [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B],
            attributes: Vec::new(),
        }
    }

    #[test]
    fn round_trips_through_read_and_write() {
        let message = empty_binding_request();
        let mut bytes = Vec::new();
        message.write(&mut bytes).unwrap();

        let decoded = Message::read(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn fingerprint_flips_when_any_byte_changes() {
        let message = empty_binding_request();
        let fingerprint = message.compute_fingerprint_over(&message.attributes);

        let mut tampered = message.clone();
        tampered.transaction_id[0] ^= 0x01;
        let tampered_fingerprint = tampered.compute_fingerprint_over(&tampered.attributes);

        assert_ne!(fingerprint, tampered_fingerprint);
    }

    #[test]
    fn short_read_is_end_of_stream() {
        let bytes = [0u8; 10];
        assert!(matches!(
            Message::read(&mut bytes.as_slice()),
            Err(DecodeError::EndOfStream)
        ));
    }

    #[test]
    fn rejects_nonzero_starting_bits() {
        let mut bytes = vec![0u8; 20];
        bytes[0] = 0xC0;
        assert!(matches!(
            Message::read(&mut bytes.as_slice()),
            Err(DecodeError::NonZeroStartingBits)
        ));
    }
}
