//! # Error Definitions
//!
//! The central ledger of runtime failures. Everything here is fatal and
//! non-resumable: the protocol has no retry path, so a violation tears the
//! current dispatch down and surfaces to whoever fed the packet in.

use std::fmt;

use sashpack::Error as CodecError;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The underlying wire buffer could not be read.
    Codec(CodecError),
    /// The packet was not valid base64.
    BadPacket,
    /// The message type byte was neither Evaluate nor Respond.
    UnknownMessageType(u8),
    /// A type slot used a marker other than full (0xFE) or cached (0xFF).
    UnknownTypeMarker(u8),
    /// A cached type slot referenced an ID that was never installed.
    UnknownTypeId(u32),
    /// An Evaluate named a function ID absent from the registry.
    UnknownFunction(u32),
    /// A reference resolved to no live heap slot.
    UnknownHandle(u64),
    /// A type descriptor used an unassigned tag byte.
    UnknownTypeTag(u8),
    /// A type descriptor nested deeper than the parser allows.
    DescriptorTooDeep,
    /// A message had bytes left over after its consumer finished.
    LeftoverBytes,
    /// More than 127 borrowed references were live at once.
    BorrowStackOverflow,
    /// `fill_next_reserved` ran with no active scope, or the scope was full.
    ReservationExhausted,
    /// A value encoded as Result was neither ok-shaped nor err-shaped.
    InvalidResultValue { found: &'static str },
    /// A value did not match the descriptor it was encoded against.
    TypeMismatch { expected: &'static str, found: &'static str },
    /// A proxy was invoked with the wrong number of arguments.
    ArityMismatch { expected: usize, found: usize },
    /// A marshalled value nested deeper than the safety limit.
    RecursionLimitExceeded,
    /// Nested Evaluates exceeded the re-entry depth limit.
    ReentryLimitExceeded,
    /// A proxy outlived the runtime it was created by.
    RuntimeGone,
    /// A method call named an unregistered exported class.
    ClassNotFound(String),
    /// A method call named a method the class does not export.
    MethodNotFound(String),
    /// A method call went through an already-freed object wrapper.
    ObjectFreed,
    /// A registered function failed; surfaces to the peer uncaught.
    Callee(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Codec(e) => write!(f, "wire decode failed: {e}"),
            Error::BadPacket => write!(f, "packet is not valid base64"),
            Error::UnknownMessageType(t) => write!(f, "unknown message type: {t}"),
            Error::UnknownTypeMarker(m) => write!(f, "unknown type slot marker: {m:#04x}"),
            Error::UnknownTypeId(id) => write!(f, "cached type {id} was never installed"),
            Error::UnknownFunction(id) => write!(f, "no registered function with id {id}"),
            Error::UnknownHandle(id) => write!(f, "no live heap slot with id {id}"),
            Error::UnknownTypeTag(t) => write!(f, "unknown type tag: {t}"),
            Error::DescriptorTooDeep => write!(f, "type descriptor nests too deeply"),
            Error::LeftoverBytes => write!(f, "leftover bytes after message was consumed"),
            Error::BorrowStackOverflow => {
                write!(f, "borrow stack overflow: more than 127 borrowed references live")
            }
            Error::ReservationExhausted => {
                write!(f, "reservation scope exhausted or absent")
            }
            Error::InvalidResultValue { found } => {
                write!(f, "cannot encode {found} as a result: neither ok- nor err-shaped")
            }
            Error::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: descriptor expects {expected}, value is {found}")
            }
            Error::ArityMismatch { expected, found } => {
                write!(f, "arity mismatch: {expected} parameters, {found} arguments")
            }
            Error::RecursionLimitExceeded => write!(f, "value nests deeper than the safety limit"),
            Error::ReentryLimitExceeded => write!(f, "re-entrant dispatch exceeded depth limit"),
            Error::RuntimeGone => write!(f, "runtime was dropped before this proxy"),
            Error::ClassNotFound(name) => write!(f, "no exported class named {name}"),
            Error::MethodNotFound(name) => write!(f, "no exported method named {name}"),
            Error::ObjectFreed => write!(f, "object wrapper was already freed"),
            Error::Callee(msg) => write!(f, "callee failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
