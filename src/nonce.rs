//! Per-client nonce minting, wire encoding, and validity tracking.
//!
//! A nonce is 29 bytes: a 9-byte implementation-defined cookie literal, 4
//! base64 characters encoding 3 bytes of security-feature flags, and two
//! little-endian `u64` fields (`id`, always zero; `validity`, microseconds
//! since the Unix epoch). See `SPEC_FULL.md` Section 4.5.

use std::collections::HashMap;
use std::net::SocketAddr;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::clock::Clock;
use crate::error::NonceError;

const VALIDITY_WINDOW_MICROS: u64 = 60_000_000;

/// Which optional capabilities a nonce advertises to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityFeatures {
    pub password_algorithms: bool,
    pub username_anonymity: bool,
}

impl SecurityFeatures {
    fn encode(self) -> [u8; 3] {
        let mut value: u32 = 0;
        if self.password_algorithms {
            value |= 1 << 23;
        }
        if self.username_anonymity {
            value |= 1 << 22;
        }
        let bytes = value.to_be_bytes();
        [bytes[1], bytes[2], bytes[3]]
    }

    fn decode(bytes: [u8; 3]) -> Self {
        let value = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        Self {
            password_algorithms: value & (1 << 23) != 0,
            username_anonymity: value & (1 << 22) != 0,
        }
    }
}

/// A minted nonce: security-feature flags plus a replay id (always zero,
/// see `SPEC_FULL.md` Open Question 4) and an absolute expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce {
    pub features: SecurityFeatures,
    pub id: u64,
    pub validity: u64,
}

/// Serialize a nonce to its 29-byte wire form, prefixed with `cookie`.
///
/// # Test
///
/// ```
/// use stun_core::nonce::{decode, encode, Nonce, SecurityFeatures};
///
/// let cookie = *b"stuncore:";
/// let nonce = Nonce { features: SecurityFeatures { password_algorithms: true, username_anonymity: false }, id: 0, validity: 123456 };
/// let bytes = encode(&nonce, &cookie);
/// assert_eq!(bytes.len(), 29);
/// assert_eq!(decode(&bytes, &cookie).unwrap(), nonce);
/// ```
pub fn encode(nonce: &Nonce, cookie: &[u8; 9]) -> [u8; 29] {
    let mut out = [0u8; 29];
    out[0..9].copy_from_slice(cookie);

    let features_b64 = BASE64_STANDARD.encode(nonce.features.encode());
    out[9..13].copy_from_slice(features_b64.as_bytes());

    out[13..21].copy_from_slice(&nonce.id.to_le_bytes());
    out[21..29].copy_from_slice(&nonce.validity.to_le_bytes());
    out
}

/// Parse a nonce from its wire form, checking it starts with `cookie`.
pub fn decode(bytes: &[u8], cookie: &[u8; 9]) -> Result<Nonce, NonceError> {
    if bytes.len() < 29 {
        return Err(NonceError::InvalidNonce);
    }

    if &bytes[0..9] != cookie {
        return Err(NonceError::InvalidCookieStart);
    }

    let features_raw = std::str::from_utf8(&bytes[9..13])
        .ok()
        .and_then(|s| BASE64_STANDARD.decode(s).ok())
        .filter(|v| v.len() == 3)
        .ok_or(NonceError::InvalidNonce)?;
    let features = SecurityFeatures::decode([features_raw[0], features_raw[1], features_raw[2]]);

    let id = u64::from_le_bytes(bytes[13..21].try_into().unwrap());
    let validity = u64::from_le_bytes(bytes[21..29].try_into().unwrap());

    Ok(Nonce {
        features,
        id,
        validity,
    })
}

/// Per-client nonce state. Created on first response requiring a nonce;
/// replaced wholesale when stale or when the requested feature set changes.
#[derive(Debug, Clone, Copy)]
struct ClientData {
    nonce: Nonce,
}

/// Tracks at most one valid [`Nonce`] per client source address.
#[derive(Debug, Default)]
pub struct NonceManager {
    clients: HashMap<SocketAddr, ClientData>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the client's current nonce, minting or refreshing it first if
    /// it's missing, expired, or doesn't offer the requested features.
    pub fn get_or_update(
        &mut self,
        source: SocketAddr,
        needs: SecurityFeatures,
        clock: &dyn Clock,
    ) -> Nonce {
        let now = clock.now_micros();

        let needs_refresh = match self.clients.get(&source) {
            None => true,
            Some(data) => now > data.nonce.validity || data.nonce.features != needs,
        };

        if needs_refresh {
            let nonce = Nonce {
                features: needs,
                id: 0,
                validity: now + VALIDITY_WINDOW_MICROS,
            };
            self.clients.insert(source, ClientData { nonce });
            nonce
        } else {
            self.clients[&source].nonce
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    const COOKIE: [u8; 9] = *b"stuncore:";

    #[test]
    fn nonce_round_trips_through_encode_and_decode() {
        let nonce = Nonce {
            features: SecurityFeatures {
                password_algorithms: true,
                username_anonymity: true,
            },
            id: 0,
            validity: 42,
        };

        let bytes = encode(&nonce, &COOKIE);
        assert_eq!(decode(&bytes, &COOKIE).unwrap(), nonce);
    }

    #[test]
    fn rejects_foreign_cookie() {
        let nonce = Nonce {
            features: SecurityFeatures::default(),
            id: 0,
            validity: 1,
        };
        let bytes = encode(&nonce, &COOKIE);
        let other_cookie = *b"different";
        assert!(matches!(
            decode(&bytes, &other_cookie),
            Err(NonceError::InvalidCookieStart)
        ));
    }

    #[test]
    fn mints_a_fresh_nonce_on_first_contact() {
        let mut manager = NonceManager::new();
        let clock = FixedClock(1_000_000);
        let source: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let nonce = manager.get_or_update(source, SecurityFeatures::default(), &clock);
        assert_eq!(nonce.validity, clock.0 + VALIDITY_WINDOW_MICROS);
    }

    #[test]
    fn refreshes_once_expired() {
        let mut manager = NonceManager::new();
        let source: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let first = manager.get_or_update(source, SecurityFeatures::default(), &FixedClock(0));
        let later_clock = FixedClock(first.validity + 1);
        let second = manager.get_or_update(source, SecurityFeatures::default(), &later_clock);

        assert_ne!(first.validity, second.validity);
    }

    #[test]
    fn refreshes_when_requested_features_change() {
        let mut manager = NonceManager::new();
        let source: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let clock = FixedClock(0);

        let first = manager.get_or_update(source, SecurityFeatures::default(), &clock);
        let second = manager.get_or_update(
            source,
            SecurityFeatures {
                password_algorithms: true,
                username_anonymity: false,
            },
            &clock,
        );

        assert_ne!(first.features, second.features);
    }
}
