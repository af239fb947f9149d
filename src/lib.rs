//! ## Session Traversal Utilities for NAT (STUN)
//!
//! [RFC8489]: https://tools.ietf.org/html/rfc8489
//!
//! STUN is intended to be used in the context of one or more NAT
//! traversal solutions. This crate implements the core of a STUN server:
//! a message codec ([`message`]) that frames and authenticates STUN
//! messages bit-exactly per [RFC8489], and a server state machine
//! ([`server`]) that authenticates clients (none / short-term / long-term
//! credentials), tracks per-client nonces ([`nonce`]), and shapes error
//! responses per the authentication state tables in [RFC8489] Section 9.2.
//!
//! Socket I/O, task supervision, and CLI entry points are left to callers;
//! this crate exposes a synchronous, single-threaded [`server::Server`]
//! driven by a byte-oriented reader/writer and an injected [`clock::Clock`].

pub mod auth;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod message;
pub mod nonce;
pub mod registry;
pub mod server;

pub use error::{BuildError, DecodeError, NonceError};
pub use message::Message;
pub use server::{MessageResult, Server, ServerOptions};
