//! STUN attribute registry and typed views.
//!
//! Attributes travel on the wire as `type(2) || length(2) || value || pad`.
//! [`Attribute`] gives each recognized type a typed, owned view constructed
//! on demand from the raw value bytes; anything not in the registry below
//! round-trips through [`crate::message::RawAttribute`] unchanged.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::DecodeError;

const MAGIC_COOKIE: u32 = 0x2112_A442;

/// The 16-bit attribute type space. Values in `0x0000..=0x7FFF` are
/// comprehension-required; unrecognized ones in that range must fail a
/// request with a 420 error (see [`crate::server`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum AttributeType {
    MappedAddress = 0x0001,
    UserName = 0x0006,
    MessageIntegrity = 0x0008,
    ErrorCode = 0x0009,
    UnknownAttributes = 0x000A,
    Realm = 0x0014,
    Nonce = 0x0015,
    PasswordAlgorithm = 0x001D,
    MessageIntegritySha256 = 0x001C,
    UserHash = 0x001E,
    XorMappedAddress = 0x0020,
    PasswordAlgorithms = 0x8002,
    AlternateDomain = 0x8003,
    Software = 0x8022,
    AlternateServer = 0x8023,
    Fingerprint = 0x8028,
}

impl AttributeType {
    /// Whether unknown attributes in this numeric range must be rejected with
    /// a 420 response if the server doesn't recognize them.
    pub fn is_comprehension_required(raw: u16) -> bool {
        raw <= 0x7FFF
    }
}

/// A typed attribute view over an owned payload.
pub trait Attribute {
    type Item;

    const TYPE: AttributeType;

    fn encode(value: &Self::Item, transaction_id: &[u8; 12], out: &mut Vec<u8>);

    fn decode(bytes: &[u8], transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError>;
}

fn ipv4_xor(addr: Ipv4Addr) -> Ipv4Addr {
    let octets = u32::from(addr) ^ MAGIC_COOKIE;
    Ipv4Addr::from(octets)
}

fn ipv6_xor(addr: Ipv6Addr, transaction_id: &[u8; 12]) -> Ipv6Addr {
    let mut octets = addr.octets();
    for (i, b) in MAGIC_COOKIE.to_be_bytes().iter().enumerate() {
        octets[i] ^= b;
    }
    for (i, b) in transaction_id.iter().enumerate() {
        octets[4 + i] ^= b;
    }
    Ipv6Addr::from(octets)
}

fn xor_port(port: u16) -> u16 {
    port ^ ((MAGIC_COOKIE >> 16) as u16)
}

fn encode_address(addr: &SocketAddr, transaction_id: &[u8; 12], is_xor: bool, out: &mut Vec<u8>) {
    out.push(0);
    match addr {
        SocketAddr::V4(v4) => {
            out.push(0x01);
            let port = if is_xor { xor_port(v4.port()) } else { v4.port() };
            out.extend_from_slice(&port.to_be_bytes());
            let ip = if is_xor { ipv4_xor(*v4.ip()) } else { *v4.ip() };
            out.extend_from_slice(&ip.octets());
        }
        SocketAddr::V6(v6) => {
            out.push(0x02);
            let port = if is_xor { xor_port(v6.port()) } else { v6.port() };
            out.extend_from_slice(&port.to_be_bytes());
            let ip = if is_xor {
                ipv6_xor(*v6.ip(), transaction_id)
            } else {
                *v6.ip()
            };
            out.extend_from_slice(&ip.octets());
        }
    }
}

fn decode_address(
    bytes: &[u8],
    transaction_id: &[u8; 12],
    is_xor: bool,
) -> Result<SocketAddr, DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::InvalidAttributeFormat);
    }

    let family = bytes[1];
    let raw_port = u16::from_be_bytes([bytes[2], bytes[3]]);
    let port = if is_xor { xor_port(raw_port) } else { raw_port };

    match family {
        0x01 => {
            if bytes.len() < 8 {
                return Err(DecodeError::InvalidAttributeFormat);
            }
            let raw = Ipv4Addr::new(bytes[4], bytes[5], bytes[6], bytes[7]);
            let ip = if is_xor { ipv4_xor(raw) } else { raw };
            Ok(SocketAddr::new(IpAddr::V4(ip), port))
        }
        0x02 => {
            if bytes.len() < 20 {
                return Err(DecodeError::InvalidAttributeFormat);
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&bytes[4..20]);
            let raw = Ipv6Addr::from(octets);
            let ip = if is_xor { ipv6_xor(raw, transaction_id) } else { raw };
            Ok(SocketAddr::new(IpAddr::V6(ip), port))
        }
        _ => Err(DecodeError::InvalidAttributeFormat),
    }
}

/// `MAPPED-ADDRESS`.
pub struct MappedAddress;

impl Attribute for MappedAddress {
    type Item = SocketAddr;
    const TYPE: AttributeType = AttributeType::MappedAddress;

    fn encode(value: &Self::Item, transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        encode_address(value, transaction_id, false, out);
    }

    fn decode(bytes: &[u8], transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        decode_address(bytes, transaction_id, false)
    }
}

/// `XOR-MAPPED-ADDRESS`.
///
/// # Test
///
/// ```
/// use stun_core::message::attributes::{Attribute, XorMappedAddress};
///
/// let txid = [0u8; 12];
/// let addr = "127.0.0.1:51678".parse().unwrap();
/// let mut buf = Vec::new();
/// XorMappedAddress::encode(&addr, &txid, &mut buf);
/// assert_eq!(XorMappedAddress::decode(&buf, &txid).unwrap(), addr);
/// ```
pub struct XorMappedAddress;

impl Attribute for XorMappedAddress {
    type Item = SocketAddr;
    const TYPE: AttributeType = AttributeType::XorMappedAddress;

    fn encode(value: &Self::Item, transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        encode_address(value, transaction_id, true, out);
    }

    fn decode(bytes: &[u8], transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        decode_address(bytes, transaction_id, true)
    }
}

fn encode_utf8(value: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(value.as_bytes());
}

fn decode_utf8(bytes: &[u8]) -> Result<String, DecodeError> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

macro_rules! string_attribute {
    ($name:ident, $ty:expr) => {
        pub struct $name;

        impl Attribute for $name {
            type Item = String;
            const TYPE: AttributeType = $ty;

            fn encode(value: &Self::Item, _transaction_id: &[u8; 12], out: &mut Vec<u8>) {
                encode_utf8(value, out);
            }

            fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
                decode_utf8(bytes)
            }
        }
    };
}

string_attribute!(UserName, AttributeType::UserName);
string_attribute!(UserHash, AttributeType::UserHash);
string_attribute!(Realm, AttributeType::Realm);
string_attribute!(Software, AttributeType::Software);
string_attribute!(AlternateDomain, AttributeType::AlternateDomain);

/// `NONCE`. Carried as opaque bytes rather than a UTF-8 string: this
/// crate's nonce wire format (see [`crate::nonce`]) embeds binary `id`/
/// `validity` fields that are not generally valid UTF-8.
pub struct NonceAttr;

impl Attribute for NonceAttr {
    type Item = Vec<u8>;
    const TYPE: AttributeType = AttributeType::Nonce;

    fn encode(value: &Self::Item, _transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        out.extend_from_slice(value);
    }

    fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        Ok(bytes.to_vec())
    }
}

/// `MESSAGE-INTEGRITY`: a raw 20-byte HMAC-SHA1 digest.
pub struct MessageIntegrity;

impl Attribute for MessageIntegrity {
    type Item = [u8; 20];
    const TYPE: AttributeType = AttributeType::MessageIntegrity;

    fn encode(value: &Self::Item, _transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        out.extend_from_slice(value);
    }

    fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        bytes.try_into().map_err(|_| DecodeError::InvalidAttributeFormat)
    }
}

/// `MESSAGE-INTEGRITY-SHA256`: a raw 32-byte HMAC-SHA256 digest.
pub struct MessageIntegritySha256;

impl Attribute for MessageIntegritySha256 {
    type Item = [u8; 32];
    const TYPE: AttributeType = AttributeType::MessageIntegritySha256;

    fn encode(value: &Self::Item, _transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        out.extend_from_slice(value);
    }

    fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        bytes.try_into().map_err(|_| DecodeError::InvalidAttributeFormat)
    }
}

/// `FINGERPRINT`: a raw CRC32-derived checksum.
pub struct Fingerprint;

impl Attribute for Fingerprint {
    type Item = u32;
    const TYPE: AttributeType = AttributeType::Fingerprint;

    fn encode(value: &Self::Item, _transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        let raw: [u8; 4] = bytes.try_into()?;
        Ok(u32::from_be_bytes(raw))
    }
}

pub struct AlternateServer;

impl Attribute for AlternateServer {
    type Item = SocketAddr;
    const TYPE: AttributeType = AttributeType::AlternateServer;

    fn encode(value: &Self::Item, transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        encode_address(value, transaction_id, false, out);
    }

    fn decode(bytes: &[u8], transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        decode_address(bytes, transaction_id, false)
    }
}

/// Password algorithm tag used by `PASSWORD-ALGORITHM`/`PASSWORD-ALGORITHMS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum PasswordAlgorithm {
    Md5 = 0x0001,
    Sha256 = 0x0002,
}

/// `PASSWORD-ALGORITHM`: algorithm tag followed by a (here, always empty)
/// parameters field padded to a 4-byte boundary.
pub struct PasswordAlgorithmAttr;

impl Attribute for PasswordAlgorithmAttr {
    type Item = PasswordAlgorithm;
    const TYPE: AttributeType = AttributeType::PasswordAlgorithm;

    fn encode(value: &Self::Item, _transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        out.extend_from_slice(&u16::from(*value).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
    }

    fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        if bytes.len() < 4 {
            return Err(DecodeError::InvalidAttributeFormat);
        }
        let algorithm = u16::from_be_bytes([bytes[0], bytes[1]]);
        PasswordAlgorithm::try_from(algorithm).map_err(|_| DecodeError::InvalidAttributeFormat)
    }
}

/// `PASSWORD-ALGORITHMS`: a list of algorithm/parameter entries.
pub struct PasswordAlgorithms;

impl Attribute for PasswordAlgorithms {
    type Item = Vec<PasswordAlgorithm>;
    const TYPE: AttributeType = AttributeType::PasswordAlgorithms;

    fn encode(value: &Self::Item, transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        for algorithm in value {
            PasswordAlgorithmAttr::encode(algorithm, transaction_id, out);
        }
    }

    fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        let mut algorithms = Vec::new();
        let mut cursor = bytes;
        while cursor.len() >= 4 {
            let algorithm = u16::from_be_bytes([cursor[0], cursor[1]]);
            let param_len = u16::from_be_bytes([cursor[2], cursor[3]]) as usize;
            let consumed = 4 + crate::message::alignment_32(param_len);
            if consumed > cursor.len() {
                return Err(DecodeError::InvalidAttributeFormat);
            }
            if let Ok(algorithm) = PasswordAlgorithm::try_from(algorithm) {
                algorithms.push(algorithm);
            }
            cursor = &cursor[consumed..];
        }
        Ok(algorithms)
    }
}

/// `UNKNOWN-ATTRIBUTES`: a list of 16-bit attribute type codes the server
/// didn't recognize and couldn't skip.
pub struct UnknownAttributes;

impl Attribute for UnknownAttributes {
    type Item = Vec<u16>;
    const TYPE: AttributeType = AttributeType::UnknownAttributes;

    fn encode(value: &Self::Item, _transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        for code in value {
            out.extend_from_slice(&code.to_be_bytes());
        }
    }

    fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        Ok(bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
    }
}

const fn errno(code: u16) -> u16 {
    ((code / 100) << 8) | (code % 100)
}

/// The error codes this crate's server state machine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum ErrorType {
    BadRequest = errno(400),
    Unauthenticated = errno(401),
    UnknownAttribute = errno(420),
    StaleNonce = errno(438),
}

impl From<ErrorType> for &'static str {
    fn from(value: ErrorType) -> Self {
        match value {
            ErrorType::BadRequest => "Bad Request",
            ErrorType::Unauthenticated => "Unauthenticated",
            ErrorType::UnknownAttribute => "Unknown Attribute",
            ErrorType::StaleNonce => "Stale Nonce",
        }
    }
}

/// `ERROR-CODE`: a numeric code (`class * 100 + number`) plus a human
/// readable reason phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: u16,
    pub reason: String,
}

impl From<ErrorType> for ErrorCode {
    fn from(value: ErrorType) -> Self {
        let raw = u16::from(value);
        let code = ((raw >> 8) * 100) + (raw & 0xff);
        Self {
            code,
            reason: <&'static str>::from(value).to_string(),
        }
    }
}

pub struct ErrorCodeAttr;

impl Attribute for ErrorCodeAttr {
    type Item = ErrorCode;
    const TYPE: AttributeType = AttributeType::ErrorCode;

    fn encode(value: &Self::Item, _transaction_id: &[u8; 12], out: &mut Vec<u8>) {
        let class = (value.code / 100) as u8;
        let number = (value.code % 100) as u8;
        out.extend_from_slice(&[0, 0, class, number]);
        out.extend_from_slice(value.reason.as_bytes());
    }

    fn decode(bytes: &[u8], _transaction_id: &[u8; 12]) -> Result<Self::Item, DecodeError> {
        if bytes.len() < 4 {
            return Err(DecodeError::InvalidAttributeFormat);
        }
        let class = bytes[2] as u16;
        let number = bytes[3] as u16;
        let code = class * 100 + number;
        let reason = std::str::from_utf8(&bytes[4..])?.to_string();
        Ok(ErrorCode { code, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_mapped_address_matches_rfc_vector() {
        let txid: [u8; 12] = [
            0x64, 0x4f, 0x5a, 0x78, 0x6a, 0x56, 0x33, 0x62, 0x4b, 0x52, 0x33, 0x31,
        ];
        let addr: SocketAddr = "192.168.0.107:1".parse().unwrap();
        let mut buf = Vec::new();
        XorMappedAddress::encode(&addr, &txid, &mut buf);
        assert_eq!(XorMappedAddress::decode(&buf, &txid).unwrap(), addr);
    }

    #[test]
    fn error_code_round_trips_through_the_wire_form() {
        let txid = [0u8; 12];
        let value: ErrorCode = ErrorType::Unauthenticated.into();
        let mut buf = Vec::new();
        ErrorCodeAttr::encode(&value, &txid, &mut buf);
        let decoded = ErrorCodeAttr::decode(&buf, &txid).unwrap();
        assert_eq!(decoded.code, 401);
    }

    #[test]
    fn password_algorithms_skip_unrecognized_entries() {
        let txid = [0u8; 12];
        let mut buf = Vec::new();
        PasswordAlgorithmAttr::encode(&PasswordAlgorithm::Md5, &txid, &mut buf);
        PasswordAlgorithmAttr::encode(&PasswordAlgorithm::Sha256, &txid, &mut buf);
        let decoded = PasswordAlgorithms::decode(&buf, &txid).unwrap();
        assert_eq!(decoded, vec![PasswordAlgorithm::Md5, PasswordAlgorithm::Sha256]);
    }
}
