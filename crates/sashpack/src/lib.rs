//! # Sashpack
//!
//! The aligned multi-buffer wire format underneath the sash binding layer.
//!
//! A message serialises four homogeneous streams — 32-bit words, 16-bit
//! halves, raw bytes, and UTF-8 text — into one buffer headed by three
//! little-endian `u32` section offsets. Keeping each stream homogeneous lets
//! the webview side view the sections as typed arrays without per-value
//! alignment fixups; this side reads them back with unaligned loads.
//!
//! ## Invariants
//! - Every numeric field is little-endian.
//! - 64-bit integers travel as `low:u32, high:u32`; 128-bit as two 64-bit
//!   halves. Signed values travel as their two's-complement bit pattern.
//! - Strings are a `u32` length in the word stream plus UTF-8 in the text
//!   stream.
//! - Reading past the end of any stream is an `Error`, never a panic.

pub mod types;
pub mod encoder;
pub mod decoder;

pub use types::Error;
pub use types::Result;

pub use encoder::Encoder;
pub use decoder::Decoder;
