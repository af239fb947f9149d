//! Message class/method encoding.
//!
//! [RFC8489 Section 5]: https://tools.ietf.org/html/rfc8489#section-5
//!
//! The 14-bit STUN message type is not the method and class concatenated
//! naively; the two class bits are spliced in between groups of method bits
//! so that the format remains compatible with the original RFC 3489 message
//! type field. See [RFC8489 Section 5] for the exact bit layout.

use crate::error::DecodeError;

/// The four STUN message classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Request,
    Indication,
    SuccessResponse,
    ErrorResponse,
}

impl Class {
    fn bits(self) -> u16 {
        match self {
            Self::Request => 0b00,
            Self::Indication => 0b01,
            Self::SuccessResponse => 0b10,
            Self::ErrorResponse => 0b11,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits {
            0b00 => Self::Request,
            0b01 => Self::Indication,
            0b10 => Self::SuccessResponse,
            _ => Self::ErrorResponse,
        }
    }
}

/// A recognized STUN method. Only `Binding` is implemented; any other 12-bit
/// method code decodes to [`DecodeError::UnsupportedMethod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Binding,
}

impl Method {
    const BINDING: u16 = 0x001;

    fn code(self) -> u16 {
        match self {
            Self::Binding => Self::BINDING,
        }
    }

    fn from_code(code: u16) -> Result<Self, DecodeError> {
        match code {
            Self::BINDING => Ok(Self::Binding),
            _ => Err(DecodeError::UnsupportedMethod),
        }
    }
}

/// Whether `method` is a valid request/indication/response target for `class`.
/// `Binding` is defined for all four classes, so this is currently always
/// `true`; it exists as the explicit first check of the server dispatch so
/// a later method gains the guard for free.
pub fn is_method_allowed_for_class(method: Method, _class: Class) -> bool {
    match method {
        Method::Binding => true,
    }
}

/// Splice a method code and class into the 14-bit STUN message type field.
///
/// # Test
///
/// ```
/// use stun_core::message::methods::{encode_message_type, Class, Method};
///
/// assert_eq!(encode_message_type(Method::Binding, Class::Request), 0x0001);
/// assert_eq!(encode_message_type(Method::Binding, Class::SuccessResponse), 0x0101);
/// assert_eq!(encode_message_type(Method::Binding, Class::ErrorResponse), 0x0111);
/// ```
pub fn encode_message_type(method: Method, class: Class) -> u16 {
    let m = method.code();
    let c = class.bits();

    let m0_3 = m & 0xf;
    let m4_6 = (m >> 4) & 0x7;
    let m7_11 = (m >> 7) & 0x1f;
    let c0 = c & 0x1;
    let c1 = (c >> 1) & 0x1;

    m0_3 | (c0 << 4) | (m4_6 << 5) | (c1 << 8) | (m7_11 << 9)
}

/// Split a 14-bit STUN message type field back into method and class.
///
/// `message_type` must already have its two leading bits masked off by the
/// caller (see [`crate::error::DecodeError::NonZeroStartingBits`]).
pub fn decode_message_type(message_type: u16) -> Result<(Method, Class), DecodeError> {
    let m0_3 = message_type & 0xf;
    let c0 = (message_type >> 4) & 0x1;
    let m4_6 = (message_type >> 5) & 0x7;
    let c1 = (message_type >> 8) & 0x1;
    let m7_11 = (message_type >> 9) & 0x1f;

    let code = m0_3 | (m4_6 << 4) | (m7_11 << 7);
    let class = Class::from_bits(c0 | (c1 << 1));

    Ok((Method::from_code(code)?, class))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_class() {
        for class in [
            Class::Request,
            Class::Indication,
            Class::SuccessResponse,
            Class::ErrorResponse,
        ] {
            let ty = encode_message_type(Method::Binding, class);
            assert_eq!(ty & 0xc000, 0);
            let (method, decoded_class) = decode_message_type(ty).unwrap();
            assert_eq!(method, Method::Binding);
            assert_eq!(decoded_class, class);
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(matches!(
            decode_message_type(0x0002),
            Err(DecodeError::UnsupportedMethod)
        ));
    }
}
