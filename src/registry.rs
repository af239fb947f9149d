//! Maps registered usernames to their credential record.

use std::collections::HashMap;

use crate::auth::Credential;

/// `username -> credential` map owned by the [`crate::server::Server`].
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<String, Credential>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a username's credential.
    pub fn register(&mut self, username: impl Into<String>, credential: Credential) {
        self.users.insert(username.into(), credential);
    }

    pub fn get(&self, username: &str) -> Option<&Credential> {
        self.users.get(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_registering_replaces_the_prior_credential() {
        let mut registry = UserRegistry::new();
        registry.register("corendos", Credential::ShortTerm { password: "a".into() });
        registry.register("corendos", Credential::ShortTerm { password: "b".into() });

        assert_eq!(
            registry.get("corendos"),
            Some(&Credential::ShortTerm { password: "b".into() })
        );
    }
}
