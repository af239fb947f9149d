//! The STUN server state machine: `handle_message` is the sole entry point,
//! consuming a decoded [`Message`] and producing a [`MessageResult`]. See
//! `SPEC_FULL.md` Section 4.6 for the full authentication state tables this
//! mirrors.

use std::net::SocketAddr;

use crate::auth::Credential;
use crate::clock::{Clock, SystemClock};
use crate::message::attributes::{
    AttributeType, ErrorCode, ErrorCodeAttr, ErrorType, NonceAttr, PasswordAlgorithm,
    PasswordAlgorithmAttr, PasswordAlgorithms, Realm, Software, UnknownAttributes, UserHash,
    UserName, XorMappedAddress,
};
use crate::message::builder::MessageBuilder;
use crate::message::methods::{is_method_allowed_for_class, Class, Method};
use crate::message::Message;
use crate::nonce::{self, NonceManager, SecurityFeatures};
use crate::registry::UserRegistry;

const DEFAULT_SOFTWARE: &str = concat!("stun-core v", env!("CARGO_PKG_VERSION"));

/// Which authentication branch `handle_message` takes for incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthenticationType {
    #[default]
    None,
    ShortTerm,
    LongTerm,
}

/// Construction-time configuration for a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub authentication_type: AuthenticationType,
    pub realm: String,
    pub algorithms: Vec<PasswordAlgorithm>,
    pub software: String,
    pub nonce_cookie: [u8; 9],
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            authentication_type: AuthenticationType::None,
            realm: "default".to_string(),
            algorithms: vec![PasswordAlgorithm::Md5, PasswordAlgorithm::Sha256],
            software: DEFAULT_SOFTWARE.to_string(),
            nonce_cookie: *b"stuncore:",
        }
    }
}

/// The three outcomes `handle_message` can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageResult {
    Discard,
    Ok,
    Response(Message),
}

/// Owns the user and per-client nonce state for one logical STUN server.
/// Single-threaded and synchronous per `SPEC_FULL.md` Section 5: callers
/// serving multiple transports either run independent `Server`s or wrap a
/// shared one behind their own mutex.
#[derive(Debug)]
pub struct Server<C: Clock = SystemClock> {
    options: ServerOptions,
    registry: UserRegistry,
    nonces: NonceManager,
    clock: C,
}

impl Server<SystemClock> {
    pub fn new(options: ServerOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }
}

impl<C: Clock> Server<C> {
    pub fn with_clock(options: ServerOptions, clock: C) -> Self {
        Self {
            options,
            registry: UserRegistry::new(),
            nonces: NonceManager::new(),
            clock,
        }
    }

    /// Register (or replace) a username's credential.
    pub fn register_user(&mut self, username: impl Into<String>, credential: Credential) {
        self.registry.register(username, credential);
    }

    /// The sole entry point: decode, validate, authenticate, and respond.
    pub fn handle_message(&mut self, message: &Message, source: SocketAddr) -> MessageResult {
        if !is_method_allowed_for_class(message.method, message.class) {
            log::debug!("discarding message from {source}: method not allowed for class");
            return MessageResult::Discard;
        }

        if message.has(AttributeType::Fingerprint) && !message.check_fingerprint() {
            log::debug!("discarding message from {source}: fingerprint mismatch");
            return MessageResult::Discard;
        }

        match message.class {
            Class::Request => self.handle_request(message, source),
            Class::Indication => self.handle_indication(message, source),
            Class::SuccessResponse | Class::ErrorResponse => {
                log::debug!("discarding unsolicited response from {source}");
                MessageResult::Discard
            }
        }
    }

    fn handle_indication(&mut self, _message: &Message, _source: SocketAddr) -> MessageResult {
        MessageResult::Ok
    }

    fn handle_request(&mut self, message: &Message, source: SocketAddr) -> MessageResult {
        if let Some(unknown) = self.scan_unknown_attributes(message) {
            log::warn!("request from {source} carries unknown comprehension-required attributes");
            return MessageResult::Response(
                self.error_response(message, ErrorType::UnknownAttribute, |b| {
                    b.add_attribute::<UnknownAttributes>(&unknown)
                }),
            );
        }

        match self.options.authentication_type {
            AuthenticationType::None => MessageResult::Response(self.success_response(message, source, &[], false)),
            AuthenticationType::ShortTerm => self.handle_short_term(message, source),
            AuthenticationType::LongTerm => self.handle_long_term(message, source),
        }
    }

    fn scan_unknown_attributes(&self, message: &Message) -> Option<Vec<u16>> {
        let unknown: Vec<u16> = message
            .attributes
            .iter()
            .filter(|a| AttributeType::try_from(a.ty).is_err() && AttributeType::is_comprehension_required(a.ty))
            .map(|a| a.ty)
            .collect();

        if unknown.is_empty() {
            None
        } else {
            Some(unknown)
        }
    }

    fn has_any_integrity(&self, message: &Message) -> bool {
        message.has(AttributeType::MessageIntegrity) || message.has(AttributeType::MessageIntegritySha256)
    }

    fn uses_sha256(&self, message: &Message) -> bool {
        message.has(AttributeType::MessageIntegritySha256)
    }

    fn check_integrity(&self, message: &Message, key: &[u8]) -> bool {
        if self.uses_sha256(message) {
            message.check_message_integrity_sha256(key)
        } else {
            message.check_message_integrity(key)
        }
    }

    fn handle_short_term(&mut self, message: &Message, source: SocketAddr) -> MessageResult {
        if !self.has_any_integrity(message) {
            return MessageResult::Response(self.error_response(message, ErrorType::BadRequest, |b| b));
        }

        let Some(username) = message.get::<UserName>() else {
            return MessageResult::Response(self.error_response(message, ErrorType::BadRequest, |b| b));
        };

        let Some(Credential::ShortTerm { password }) = self.registry.get(&username).cloned() else {
            return MessageResult::Response(self.error_response(message, ErrorType::Unauthenticated, |b| b));
        };

        let key = Credential::ShortTerm { password }.compute_key();
        if !self.check_integrity(message, &key) {
            return MessageResult::Response(self.error_response(message, ErrorType::Unauthenticated, |b| b));
        }

        MessageResult::Response(self.success_response(message, source, &key, self.uses_sha256(message)))
    }

    fn handle_long_term(&mut self, message: &Message, source: SocketAddr) -> MessageResult {
        if !self.has_any_integrity(message) {
            return MessageResult::Response(self.unauthenticated_long_term(message, source, SecurityFeatures::default()));
        }

        let username = message.get::<UserName>();
        let has_identity = username.is_some() || message.get::<UserHash>().is_some();
        let realm = message.get::<Realm>();
        let raw_nonce = message.get::<NonceAttr>();

        if !has_identity || realm.is_none() || raw_nonce.is_none() {
            return MessageResult::Response(self.error_response(message, ErrorType::BadRequest, |b| b));
        }

        let parsed_nonce = raw_nonce
            .as_deref()
            .and_then(|bytes| nonce::decode(bytes, &self.options.nonce_cookie).ok());

        let Some(parsed_nonce) = parsed_nonce else {
            return MessageResult::Response(self.stale_nonce_response(message, source));
        };

        let algorithm_field = message.get::<PasswordAlgorithmAttr>();
        let algorithms_field = message.get::<PasswordAlgorithms>();

        if parsed_nonce.features.password_algorithms && (algorithm_field.is_some() != algorithms_field.is_some()) {
            return MessageResult::Response(self.error_response(message, ErrorType::BadRequest, |b| b));
        }

        if let Some(ref offered) = algorithms_field {
            if offered != &self.options.algorithms {
                return MessageResult::Response(self.error_response(message, ErrorType::BadRequest, |b| b));
            }
        }

        if let Some(chosen) = algorithm_field {
            if !self.options.algorithms.contains(&chosen) {
                return MessageResult::Response(self.error_response(message, ErrorType::BadRequest, |b| b));
            }
        }

        let username = username.unwrap_or_default();
        let Some(Credential::LongTerm { username, realm, password }) = self.registry.get(&username).cloned() else {
            return MessageResult::Response(self.unauthenticated_long_term(
                message,
                source,
                SecurityFeatures {
                    password_algorithms: true,
                    username_anonymity: false,
                },
            ));
        };

        let key = Credential::LongTerm { username, realm, password }.compute_key();
        if !self.check_integrity(message, &key) {
            return MessageResult::Response(self.unauthenticated_long_term(message, source, SecurityFeatures::default()));
        }

        if parsed_nonce.validity < self.clock.now_micros() {
            return MessageResult::Response(self.stale_nonce_response(message, source));
        }

        MessageResult::Response(self.success_response(message, source, &key, self.uses_sha256(message)))
    }

    fn unauthenticated_long_term(&mut self, message: &Message, source: SocketAddr, features: SecurityFeatures) -> Message {
        let fresh = self.nonces.get_or_update(source, features, &self.clock);
        let nonce_bytes = nonce::encode(&fresh, &self.options.nonce_cookie).to_vec();
        let realm = self.options.realm.clone();
        let algorithms = self.options.algorithms.clone();

        self.error_response(message, ErrorType::Unauthenticated, move |b| {
            let b = b
                .add_attribute::<Realm>(&realm)
                .add_attribute::<NonceAttr>(&nonce_bytes);
            if features.password_algorithms {
                b.add_attribute::<PasswordAlgorithms>(&algorithms)
            } else {
                b
            }
        })
    }

    fn stale_nonce_response(&mut self, message: &Message, source: SocketAddr) -> Message {
        let features = SecurityFeatures {
            password_algorithms: true,
            username_anonymity: false,
        };
        let fresh = self.nonces.get_or_update(source, features, &self.clock);
        let nonce_bytes = nonce::encode(&fresh, &self.options.nonce_cookie).to_vec();
        let realm = self.options.realm.clone();
        let algorithms = self.options.algorithms.clone();

        self.error_response(message, ErrorType::StaleNonce, move |b| {
            b.add_attribute::<Realm>(&realm)
                .add_attribute::<NonceAttr>(&nonce_bytes)
                .add_attribute::<PasswordAlgorithms>(&algorithms)
        })
    }

    fn error_response(
        &self,
        message: &Message,
        error: ErrorType,
        extra: impl FnOnce(MessageBuilder) -> MessageBuilder,
    ) -> Message {
        let error_code: ErrorCode = error.into();
        let builder = MessageBuilder::new()
            .set_class(Class::ErrorResponse)
            .set_method(Method::Binding)
            .set_transaction_id(message.transaction_id)
            .add_attribute::<ErrorCodeAttr>(&error_code);
        let builder = extra(builder);
        builder
            .add_attribute::<Software>(&self.options.software)
            .build()
            .expect("class, method, and transaction id are always set here")
    }

    fn success_response(&self, message: &Message, source: SocketAddr, key: &[u8], sha256: bool) -> Message {
        let builder = MessageBuilder::new()
            .set_class(Class::SuccessResponse)
            .set_method(Method::Binding)
            .set_transaction_id(message.transaction_id)
            .add_attribute::<XorMappedAddress>(&source)
            .add_attribute::<Software>(&self.options.software);

        let builder = if key.is_empty() {
            builder
        } else if sha256 {
            builder.add_message_integrity_sha256(key.to_vec())
        } else {
            builder.add_message_integrity(key.to_vec())
        };

        builder
            .add_fingerprint()
            .build()
            .expect("class, method, and transaction id are always set here")
    }
}
