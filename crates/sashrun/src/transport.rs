//! # Synchronous transport to the native peer
//!
//! A minimal, object-safe interface for moving opaque buffers. The
//! transport knows nothing about messages, descriptors, or the heap.
//!
//! Every send blocks until the peer replies; while it blocks, the peer may
//! hand back another Evaluate instead of a Respond, which the runtime
//! services by re-entering the message pump on the same logical stack.
//!
//! There is no error channel: a failed exchange is `None`, which the
//! runtime treats as an empty response. No retries are attempted.
//!
//! Over HTTP the payload travels base64-encoded in a request header (the
//! platform forbids request bodies on this path) and the response comes
//! back as base64 text; [`encode_packet`] / [`decode_packet`] implement
//! that framing so an HTTP binding and the tests agree on it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A synchronous request/response channel to the peer.
pub trait Transport {
    /// Deliver a Respond (or answer to peer-initiated traffic) on the
    /// reply endpoint. A non-`None` return is the peer's next message.
    fn respond(&self, payload: &[u8]) -> Option<Vec<u8>>;

    /// Deliver an outbound call on the call endpoint and block for the
    /// peer's answer.
    fn call(&self, payload: &[u8]) -> Option<Vec<u8>>;
}

/// Base64-frame a binary payload for the header-carried transport.
pub fn encode_packet(payload: &[u8]) -> String {
    STANDARD.encode(payload)
}

/// Recover a binary payload from its base64 framing.
pub fn decode_packet(packet: &str) -> Option<Vec<u8>> {
    STANDARD.decode(packet).ok()
}
