//! Cryptographic primitives the codec and authentication module build on:
//! HMAC digests for `MESSAGE-INTEGRITY`/`MESSAGE-INTEGRITY-SHA256`, the
//! CRC32-based `FINGERPRINT`, the long-term credential key derivation, and
//! OpaqueString (RFC 8265) normalization.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;

/// HMAC-SHA1 digest, used for the classic `MESSAGE-INTEGRITY` attribute.
///
/// # Test
///
/// ```
/// use stun_core::crypto::hmac_sha1;
///
/// let buffer = [
///     0x00u8, 0x01, 0x00, 0x18, 0x21, 0x12, 0xa4, 0x42, 0x01, 0x02, 0x03,
///     0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
/// ];
/// let key = b"password";
/// let first = hmac_sha1(key, &buffer);
/// let second = hmac_sha1(key, &buffer);
/// assert_eq!(first, second);
/// assert_eq!(first.len(), 20);
/// ```
pub fn hmac_sha1(key: &[u8], source: &[u8]) -> [u8; 20] {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(source);
    let mut result = [0u8; 20];
    result.copy_from_slice(&mac.finalize().into_bytes());
    result
}

/// HMAC-SHA256 digest, used for `MESSAGE-INTEGRITY-SHA256`.
pub fn hmac_sha256(key: &[u8], source: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(source);
    let mut result = [0u8; 32];
    result.copy_from_slice(&mac.finalize().into_bytes());
    result
}

/// CRC32 fingerprint, XOR'd with the `"STUN"` magic per RFC8489 Section 14.7.
///
/// # Test
///
/// ```
/// use stun_core::crypto::fingerprint;
///
/// assert_eq!(fingerprint(b"1"), 3498621689);
/// ```
pub fn fingerprint(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes) ^ 0x5354_554e
}

/// OpaqueString-ish normalization (RFC 8265) of a UTF-8 credential
/// component. Falls back to the input unchanged when SASLprep rejects a
/// codepoint, per the minimum-useful-implementation allowance this
/// derivation relies on.
pub fn opaque_string(value: &str) -> String {
    stringprep::saslprep(value)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Long-term credential key: `MD5(username ":" OpaqueString(realm) ":"
/// OpaqueString(password))`.
///
/// # Test
///
/// ```
/// use stun_core::crypto::long_term_key;
///
/// let key = long_term_key("user", "realm", "pass");
/// assert_eq!(
///     key,
///     [
///         0x84, 0x93, 0xFB, 0xC5, 0x3B, 0xA5, 0x82, 0xFB, 0x4C, 0x04, 0x4C,
///         0x45, 0x6B, 0xDC, 0x40, 0xEB,
///     ]
/// );
/// ```
pub fn long_term_key(username: &str, realm: &str, password: &str) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(username);
    hasher.update(":");
    hasher.update(opaque_string(realm));
    hasher.update(":");
    hasher.update(opaque_string(password));
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha1_changes_with_the_key() {
        let a = hmac_sha1(b"one", b"payload");
        let b = hmac_sha1(b"two", b"payload");
        assert_ne!(a, b);
    }

    #[test]
    fn long_term_key_is_deterministic() {
        let a = long_term_key("corendos", "default", "password");
        let b = long_term_key("corendos", "default", "password");
        assert_eq!(a, b);
    }
}
