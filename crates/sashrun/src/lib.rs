//! # Sashrun
//!
//! The webview-side runtime of the sash binding layer. The native peer owns
//! control flow; this runtime services batched Evaluate messages against an
//! injected function registry, keeps the shared object heap in lock-step
//! with the peer, and proxies callbacks back across the boundary over a
//! synchronous request/response transport.
//!
//! ## Architecture
//!
//! - [`heap`] — the slotted object heap: a descending borrow stack in IDs
//!   1–127, four reserved constants at 128–131, and a monotonic allocated
//!   range from 132 up.
//! - [`types`] + [`marshal`] — self-describing type descriptors transmitted
//!   (and cached) on the wire, and the type-directed value codec they drive.
//! - [`runtime`] — the re-entrant message pump: Evaluate in, Respond out,
//!   nested Evaluates serviced on the same logical stack.
//! - [`proxy`] — wrappers for native functions and exported native objects,
//!   with drop notification back to the peer.
//!
//! Scheduling is single-threaded and cooperative; nothing here is `Send`.

pub mod error;
pub mod value;
pub mod heap;
pub mod types;
pub mod marshal;
pub mod registry;
pub mod proxy;
pub mod transport;
pub mod runtime;

pub use error::Error;
pub use error::Result;
pub use value::Value;
pub use heap::Heap;
pub use types::FuncType;
pub use types::TypeDesc;
pub use types::TypeTag;
pub use registry::FunctionRegistry;
pub use proxy::PeerClass;
pub use proxy::PeerFunction;
pub use proxy::PeerObject;
pub use transport::Transport;
pub use runtime::Runtime;

#[cfg(test)]
mod mock_transport;
