//! Authentication key derivation.
//!
//! [`Credential`] is a tagged union dispatched by variant rather than stored
//! behind a trait object: every variant is small and cheap to clone, so
//! there's no benefit to dynamic dispatch here (see `SPEC_FULL.md` Design
//! Notes).

use crate::crypto::{long_term_key, opaque_string};

/// A registered client's credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    None,
    ShortTerm { password: String },
    LongTerm {
        username: String,
        realm: String,
        password: String,
    },
}

impl Credential {
    /// Derive the HMAC key this credential authenticates with.
    pub fn compute_key(&self) -> Vec<u8> {
        match self {
            Self::None => Vec::new(),
            Self::ShortTerm { password } => opaque_string(password).into_bytes(),
            Self::LongTerm {
                username,
                realm,
                password,
            } => long_term_key(username, realm, password).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_key_is_pure() {
        let credential = Credential::LongTerm {
            username: "corendos".into(),
            realm: "default".into(),
            password: "password".into(),
        };

        assert_eq!(credential.compute_key(), credential.compute_key());
    }

    #[test]
    fn none_credential_has_an_empty_key() {
        assert!(Credential::None.compute_key().is_empty());
    }
}
