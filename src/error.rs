//! Error types.
//!
//! [`ParsingError`] and [`StoringError`] describe low-level codec failures; [`Error`] is what the
//! session-level operations return and classifies each failure into one of the kinds a caller of
//! a security mechanism needs to tell apart.


use std::fmt;


/// An error that may occur while parsing NTLM structures.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ParsingError {
    /// The header is shorter than expected.
    ShortHeader { expected_min_len: usize, obtained_len: usize },

    /// The magic value does not match the expected one.
    MagicMismatch { expected: [u8; 8], obtained: Vec<u8> },

    /// The message type is not the one that was expected.
    MessageTypeMismatch { expected: u32, obtained: u32 },

    /// An internal item has a different length than expected.
    ItemLengthMismatch { expected: usize, obtained: usize },

    /// An internal item is shorter than expected.
    ItemMinLengthMismatch { expected_at_least: usize, obtained: usize },

    /// An internal item's length is not divisible by an expected divisor.
    ItemLengthNotDivisible { expected_divisor: usize, obtained_length: usize },

    /// A byte string cannot be decoded using the current OEM encoding.
    InvalidOemEncoding { value: Vec<u8> },

    /// A string of 16-bit characters could not be decoded.
    InvalidUtf16 { value: Vec<u16> },

    /// A security buffer points into the fixed header of the message.
    OffsetInsideHeader { offset: u32, header_len: usize },

    /// A security buffer extends past the end of the message.
    EndOutOfRange { end: usize, length: usize },

    /// Neither Unicode nor OEM encoding was selected.
    NeitherUnicodeNorOem,
}
impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortHeader { expected_min_len, obtained_len }
                => write!(f, "header too short (expected at least {} bytes, obtained {})", expected_min_len, obtained_len),
            Self::MagicMismatch { expected, obtained }
                => write!(f, "mismatched magic (expected {:?}, obtained {:?})", expected, obtained),
            Self::MessageTypeMismatch { expected, obtained }
                => write!(f, "unexpected message type (expected {}, obtained {})", expected, obtained),
            Self::ItemLengthMismatch { expected, obtained }
                => write!(f, "insufficient length for an internal item (expected {:?}, obtained {:?})", expected, obtained),
            Self::ItemMinLengthMismatch { expected_at_least, obtained }
                => write!(f, "insufficient minimum length for an internal item (expected at least {:?}, obtained {:?})", expected_at_least, obtained),
            Self::ItemLengthNotDivisible { expected_divisor, obtained_length }
                => write!(f, "item length {} not divisible by {}", obtained_length, expected_divisor),
            Self::InvalidOemEncoding { value }
                => write!(f, "failed to decode value with the current OEM encoding: {:?}", value),
            Self::InvalidUtf16 { value }
                => write!(f, "failed to decode value as UTF-16: {:?}", value),
            Self::OffsetInsideHeader { offset, header_len }
                => write!(f, "field offset {} points into the {}-byte message header", offset, header_len),
            Self::EndOutOfRange { end, length }
                => write!(f, "end ({}) out of range (message has {} bytes)", end, length),
            Self::NeitherUnicodeNorOem
                => write!(f, "neither Unicode nor OEM encoding was selected"),
        }
    }
}
impl std::error::Error for ParsingError {
}

/// An error that may occur while writing an NTLM structure.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum StoringError {
    /// The string cannot be encoded using the OEM encoding.
    NonOemEncodable { string: String },

    /// Neither Unicode nor OEM encoding was selected.
    NeitherUnicodeNorOem,

    /// A field is too long to be described by a security buffer.
    FieldTooLong { length: usize },
}
impl fmt::Display for StoringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonOemEncodable { string }
                => write!(f, "failed to encode {:?} using OEM encoding", string),
            Self::NeitherUnicodeNorOem
                => write!(f, "neither Unicode nor OEM encoding was selected"),
            Self::FieldTooLong { length }
                => write!(f, "field of {} bytes does not fit into a security buffer", length),
        }
    }
}
impl std::error::Error for StoringError {
}

/// An error returned by the session operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The peer's message is too short or one of its fields is out of bounds.
    MalformedMessage(ParsingError),

    /// The peer's message has the wrong signature or type, or the negotiated options are
    /// incompatible.
    ProtocolMismatch { reason: String },

    /// A cryptographic primitive could not be set up, usually because of an invalid key length.
    CryptoFailure { reason: String },

    /// The operation is not valid in the current state of the session.
    SequenceError { operation: &'static str, state: crate::session::SessionState },

    /// One of our own values cannot be written to the wire.
    Encoding(StoringError),
}
impl Error {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Self::ProtocolMismatch { reason: reason.into() }
    }

    pub(crate) fn crypto(reason: impl Into<String>) -> Self {
        Self::CryptoFailure { reason: reason.into() }
    }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMessage(e)
                => write!(f, "malformed message: {}", e),
            Self::ProtocolMismatch { reason }
                => write!(f, "protocol mismatch: {}", reason),
            Self::CryptoFailure { reason }
                => write!(f, "cryptographic failure: {}", reason),
            Self::SequenceError { operation, state }
                => write!(f, "{} is not valid in state {:?}", operation, state),
            Self::Encoding(e)
                => write!(f, "failed to encode message: {}", e),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedMessage(e) => Some(e),
            Self::Encoding(e) => Some(e),
            _ => None,
        }
    }
}
impl From<ParsingError> for Error {
    fn from(e: ParsingError) -> Self {
        // signature, type and encoding mismatches are protocol errors, everything else is a framing
        // problem
        match e {
            ParsingError::MagicMismatch { .. }
                | ParsingError::MessageTypeMismatch { .. }
                | ParsingError::NeitherUnicodeNorOem
                => Self::ProtocolMismatch { reason: e.to_string() },
            other
                => Self::MalformedMessage(other),
        }
    }
}
impl From<StoringError> for Error {
    fn from(e: StoringError) -> Self {
        Self::Encoding(e)
    }
}

/// Shorthand for results of session operations.
pub type Result<T> = std::result::Result<T, Error>;
