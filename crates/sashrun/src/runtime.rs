//! # The Message Pump
//!
//! The runtime owns the heap, type cache, function registry, exported
//! class table, and transport, and drives the re-entrant dispatch loop.
//!
//! Control flow belongs to the peer. A packet arrives, the pump reads the
//! message type, and an Evaluate is serviced operation by operation:
//! resolve the type slot, decode arguments, invoke the registered
//! function, place the return value. The finished Respond goes back on the
//! reply endpoint — and the answer to *that* request may itself be another
//! Evaluate (a callback from within the peer's processing), which the pump
//! services on the same logical stack. Borrow frames and reservation
//! scopes nest naturally across this recursion.
//!
//! ## Invariants
//! - One borrow frame spans each whole Evaluate; proxies push one more per
//!   outbound call.
//! - A reservation scope is pushed iff the Evaluate announced a non-zero
//!   placeholder count, and popped when the message is drained.
//! - Every message must leave its decoder fully drained.

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::rc::Weak;

use log::debug;
use log::trace;

use sashpack::Decoder;
use sashpack::Encoder;

use crate::error::Error;
use crate::error::Result;
use crate::heap::Heap;
use crate::marshal;
use crate::proxy::PeerClass;
use crate::proxy::PeerObject;
use crate::registry::FunctionRegistry;
use crate::transport;
use crate::transport::Transport;
use crate::types::FuncType;
use crate::types::TypeCache;
use crate::types::TYPE_CACHED;
use crate::types::TYPE_FULL;
use crate::value::Value;

pub(crate) const MSG_EVALUATE: u8 = 0;
pub(crate) const MSG_RESPOND: u8 = 1;

/// Nested Evaluates beyond this depth are refused.
const MAX_REENTRY_DEPTH: usize = 64;

/// Shared state behind every [`Runtime`] handle.
pub(crate) struct RuntimeInner {
    pub(crate) heap: RefCell<Heap>,
    types: RefCell<TypeCache>,
    registry: RefCell<FunctionRegistry>,
    classes: RefCell<HashMap<String, PeerClass>>,
    transport: Box<dyn Transport>,
    depth: Cell<usize>,
}

/// Handle to the webview-side runtime. Cheap to clone; all clones share
/// the same heap, caches, and transport.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

/// An owned Respond message, yielded by the pump to whoever was waiting
/// on an outbound call.
pub(crate) struct Reply {
    data: Vec<u8>,
}

impl Reply {
    /// What a failed (null) transport exchange degrades to.
    pub(crate) fn empty() -> Self {
        let mut enc = Encoder::new();
        enc.push_u8(MSG_RESPOND);
        Self { data: enc.finalize() }
    }

    /// A decoder positioned after the message-type byte.
    pub(crate) fn decoder(&self) -> Result<Decoder<'_>> {
        let mut dec = Decoder::from_bytes(&self.data)?;
        let ty = dec.take_u8()?;
        if ty != MSG_RESPOND {
            return Err(Error::UnknownMessageType(ty));
        }
        Ok(dec)
    }
}

impl Runtime {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                heap: RefCell::new(Heap::new()),
                types: RefCell::new(TypeCache::new()),
                registry: RefCell::new(FunctionRegistry::new()),
                classes: RefCell::new(HashMap::new()),
                transport: Box::new(transport),
                depth: Cell::new(0),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_weak(weak: &Weak<RuntimeInner>) -> Result<Self> {
        weak.upgrade().map(|inner| Runtime { inner }).ok_or(Error::RuntimeGone)
    }

    /// Replace the whole function table.
    pub fn set_registry(&self, registry: FunctionRegistry) {
        *self.inner.registry.borrow_mut() = registry;
    }

    /// Install a single callable under `id`.
    pub fn register_function(
        &self,
        id: u32,
        func: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) {
        self.inner.registry.borrow_mut().insert(id, func);
    }

    /// Register an exported class's method signatures by name.
    pub fn register_class(&self, class: PeerClass) {
        self.inner.classes.borrow_mut().insert(class.name().to_string(), class);
    }

    pub(crate) fn class_method(&self, class: &str, method: &str) -> Result<Rc<FuncType>> {
        let classes = self.inner.classes.borrow();
        let entry = classes
            .get(class)
            .ok_or_else(|| Error::ClassNotFound(class.to_string()))?;
        entry
            .lookup(method)
            .ok_or_else(|| Error::MethodNotFound(format!("{class}::{method}")))
    }

    /// Wrap a native handle in an object proxy for a registered class.
    pub fn wrap_object(&self, class: &str, handle: u64) -> PeerObject {
        PeerObject::new(self, class.to_string(), handle)
    }

    /// Entry point for peer-initiated traffic: a base64 packet in, nothing
    /// out. Errors are raised to the embedder; none are resumable.
    pub fn handle_packet(&self, packet: &str) -> Result<()> {
        let bytes = transport::decode_packet(packet).ok_or(Error::BadPacket)?;
        self.handle_bytes(bytes)
    }

    /// Entry point for embedders that already hold the raw message.
    pub fn handle_bytes(&self, bytes: Vec<u8>) -> Result<()> {
        debug!("handling {}-byte packet from peer", bytes.len());
        match self.pump(bytes)? {
            None => Ok(()),
            // A top-level Respond has no caller waiting on values, so any
            // content is a protocol error.
            Some(reply) => {
                let dec = reply.decoder()?;
                if dec.is_empty() {
                    Ok(())
                } else {
                    Err(Error::LeftoverBytes)
                }
            }
        }
    }

    /// Send an outbound call and pump until its Respond arrives, servicing
    /// any nested Evaluates in between. A null transport result degrades
    /// to an empty Respond.
    pub(crate) fn round_trip(&self, payload: Vec<u8>) -> Result<Reply> {
        match self.inner.transport.call(&payload) {
            Some(bytes) => Ok(self.pump(bytes)?.unwrap_or_else(Reply::empty)),
            None => Ok(Reply::empty()),
        }
    }

    /// Drive the Evaluate/Respond chain starting from `first`.
    ///
    /// Returns `Some(reply)` when a Respond arrives (it belongs to the
    /// innermost outstanding call), or `None` when the chain ends with the
    /// transport going quiet after our own Respond.
    fn pump(&self, first: Vec<u8>) -> Result<Option<Reply>> {
        let mut current = first;
        loop {
            let respond = {
                let mut dec = Decoder::from_bytes(&current)?;
                match dec.take_u8()? {
                    MSG_EVALUATE => {
                        let respond = self.run_evaluate(&mut dec)?;
                        if !dec.is_empty() {
                            return Err(Error::LeftoverBytes);
                        }
                        Some(respond)
                    }
                    MSG_RESPOND => None,
                    ty => return Err(Error::UnknownMessageType(ty)),
                }
            };
            match respond {
                None => return Ok(Some(Reply { data: current })),
                Some(respond) => match self.inner.transport.respond(&respond) {
                    Some(next) => current = next,
                    None => return Ok(None),
                },
            }
        }
    }

    fn run_evaluate(&self, dec: &mut Decoder) -> Result<Vec<u8>> {
        let depth = self.inner.depth.get();
        if depth >= MAX_REENTRY_DEPTH {
            return Err(Error::ReentryLimitExceeded);
        }
        self.inner.depth.set(depth + 1);
        let result = self.evaluate_batch(dec);
        self.inner.depth.set(self.inner.depth.get() - 1);
        result
    }

    fn evaluate_batch(&self, dec: &mut Decoder) -> Result<Vec<u8>> {
        // A zero count means non-batched mode: return-value references go
        // through the ordinary water-mark path instead of placeholders.
        let reserved = dec.take_u32()?;
        {
            let mut heap = self.inner.heap.borrow_mut();
            heap.push_borrow_frame();
            if reserved > 0 {
                heap.push_reservation_scope(reserved);
            }
        }

        let mut reply = Encoder::new();
        reply.push_u8(MSG_RESPOND);
        let outcome = self.run_operations(dec, reserved > 0, &mut reply);

        // Cleared borrow entries are dropped outside the heap borrow: a
        // dropped callback sends its own release message.
        let cleared = {
            let mut heap = self.inner.heap.borrow_mut();
            let cleared = heap.pop_borrow_frame();
            if reserved > 0 {
                heap.pop_reservation_scope();
            }
            cleared
        };
        drop(cleared);

        outcome?;
        Ok(reply.finalize())
    }

    fn run_operations(&self, dec: &mut Decoder, batched: bool, reply: &mut Encoder) -> Result<()> {
        while dec.has_more_words() {
            let fn_id = dec.take_u32()?;
            let sig = self.read_type_slot(dec)?;
            trace!("dispatching fn {fn_id} ({} params)", sig.params.len());

            let mut args = Vec::with_capacity(sig.params.len());
            for param in &sig.params {
                args.push(marshal::decode_value(self, param, dec)?);
            }

            let func = self
                .inner
                .registry
                .borrow()
                .get(fn_id)
                .ok_or(Error::UnknownFunction(fn_id))?;
            let value = func(&args)?;

            // In batched mode the peer has already handed out the
            // placeholder ID for this return value and is relying on it.
            if batched && sig.ret.is_heap_ref() {
                self.inner.heap.borrow_mut().fill_next_reserved(value)?;
            } else {
                marshal::encode_value(self, &sig.ret, &value, reply)?;
            }
        }
        Ok(())
    }

    /// Resolve a type slot: a full definition installs itself into the
    /// cache under its 32-bit ID; a cached reference looks it up.
    fn read_type_slot(&self, dec: &mut Decoder) -> Result<Rc<FuncType>> {
        match dec.take_u8()? {
            TYPE_FULL => {
                let id = dec.take_u32()?;
                let sig = Rc::new(FuncType::parse(dec)?);
                self.inner.types.borrow_mut().install(id, sig.clone());
                Ok(sig)
            }
            TYPE_CACHED => {
                let id = dec.take_u32()?;
                self.inner.types.borrow().lookup(id).ok_or(Error::UnknownTypeId(id))
            }
            marker => Err(Error::UnknownTypeMarker(marker)),
        }
    }

    /// Number of cached type signatures (for tests and diagnostics).
    pub fn cached_types(&self) -> usize {
        self.inner.types.borrow().len()
    }

    // Heap surface for generated glue and embedders.

    pub fn heap_insert(&self, value: Value) -> u64 {
        self.inner.heap.borrow_mut().insert(value)
    }

    pub fn heap_value(&self, id: u64) -> Result<Value> {
        self.inner.heap.borrow().get(id)
    }

    pub fn heap_contains(&self, id: u64) -> bool {
        self.inner.heap.borrow().has(id)
    }

    pub fn heap_remove(&self, id: u64) -> bool {
        let evicted = self.inner.heap.borrow_mut().remove(id);
        evicted.is_some()
    }

    pub fn water_mark(&self) -> u64 {
        self.inner.heap.borrow().water_mark()
    }

    pub fn live_count(&self) -> usize {
        self.inner.heap.borrow().live_count()
    }
}
