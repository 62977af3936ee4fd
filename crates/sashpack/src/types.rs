//! Core error types for the sashpack wire format.

use std::fmt;

/// Failures while reading a wire buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The buffer is shorter than the 12-byte section header.
    MessageTooShort { expected: usize, actual: usize },
    /// The section offsets are out of order, out of bounds, or misaligned.
    InvalidHeader {
        u16_offset: u32,
        u8_offset: u32,
        str_offset: u32,
        total_len: usize,
    },
    /// The 32-bit word stream is exhausted.
    WordsExhausted,
    /// The 16-bit half stream is exhausted.
    HalvesExhausted,
    /// The byte stream is exhausted.
    BytesExhausted,
    /// The text stream has fewer bytes than a string length claims.
    TextTooShort { expected: usize, actual: usize },
    /// The text stream contains invalid UTF-8.
    InvalidUtf8 { position: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MessageTooShort { expected, actual } => {
                write!(f, "message too short: expected at least {expected} bytes, got {actual}")
            }
            Error::InvalidHeader { u16_offset, u8_offset, str_offset, total_len } => {
                write!(
                    f,
                    "invalid section header: u16={u16_offset}, u8={u8_offset}, str={str_offset}, total_len={total_len}"
                )
            }
            Error::WordsExhausted => write!(f, "word stream exhausted"),
            Error::HalvesExhausted => write!(f, "half stream exhausted"),
            Error::BytesExhausted => write!(f, "byte stream exhausted"),
            Error::TextTooShort { expected, actual } => {
                write!(f, "text stream too short: expected {expected} bytes, got {actual}")
            }
            Error::InvalidUtf8 { position } => {
                write!(f, "invalid UTF-8 in text stream at byte {position}")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
