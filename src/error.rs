//! Error taxonomy for the three seams the codec and builder expose to callers.
//!
//! Kept as plain enums with manual `Display`/`Error` impls rather than a
//! derive-macro crate, matching the style of the codec this crate is built
//! from.

use std::array::TryFromSliceError;
use std::str::Utf8Error;

/// Errors returned from [`crate::message::Message::read`] and attribute parsing.
#[derive(Debug)]
pub enum DecodeError {
    OutOfMemory,
    EndOfStream,
    NonZeroStartingBits,
    WrongMagicCookie,
    UnsupportedMethod,
    UnknownAttribute(u16),
    InvalidAttributeFormat,
    Utf8Error(Utf8Error),
    TryFromSliceError(TryFromSliceError),
}

impl std::error::Error for DecodeError {}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<Utf8Error> for DecodeError {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl From<TryFromSliceError> for DecodeError {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}

/// Errors returned from [`crate::nonce::decode`].
#[derive(Debug)]
pub enum NonceError {
    InvalidNonce,
    InvalidCookieStart,
}

impl std::error::Error for NonceError {}

impl std::fmt::Display for NonceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Errors returned from [`crate::message::builder::MessageBuilder::build`].
#[derive(Debug)]
pub enum BuildError {
    InvalidMessage,
}

impl std::error::Error for BuildError {}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
