//! # Peer Proxies
//!
//! Wrappers that make native-side callables and objects usable as local
//! values. A proxy marshals its arguments, sends an Evaluate on the
//! outbound endpoint, services any nested Evaluates the peer issues while
//! processing, and decodes the final Respond.
//!
//! Lifetime notification is a dispose discipline: dropping the last handle
//! to a wrapper sends the matching release message to the peer. Wrappers
//! hold the runtime weakly, so a wrapper outliving its runtime degrades to
//! a silent no-op on drop and a [`RuntimeGone`](crate::Error::RuntimeGone)
//! error on use.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::rc::Weak;

use log::warn;
use sashpack::Encoder;

use crate::error::Error;
use crate::error::Result;
use crate::marshal;
use crate::runtime::MSG_EVALUATE;
use crate::runtime::Runtime;
use crate::runtime::RuntimeInner;
use crate::types::FuncType;
use crate::types::TypeDesc;
use crate::value::Value;

/// Outbound selector: invoke a registered native function by 64-bit ID.
pub const INVOKE_NATIVE: u32 = 0;

/// Reserved selector: a locally held native-function wrapper was released.
pub const DROP_NATIVE_REF: u32 = 0xFFFF_FFFF;

/// Reserved selector: invoke an exported method, named by a
/// `"ClassName::method"` string selector followed by the object handle.
pub const CALL_EXPORTED_METHOD: u32 = 0xFFFF_FFFE;

/// Pops a borrow frame on every exit path.
pub(crate) struct FrameGuard {
    rt: Runtime,
}

impl FrameGuard {
    pub(crate) fn push(rt: &Runtime) -> Self {
        rt.inner.heap.borrow_mut().push_borrow_frame();
        Self { rt: rt.clone() }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        // The cleared values must outlive the heap borrow: dropping one may
        // itself send a release message that re-enters the heap.
        let cleared = self.rt.inner.heap.borrow_mut().pop_borrow_frame();
        drop(cleared);
    }
}

/// A callable that forwards to a native function on the peer.
///
/// Cheap to clone; the last clone to drop sends the drop-native-reference
/// message.
#[derive(Clone)]
pub struct PeerFunction {
    inner: Rc<PeerFnInner>,
}

struct PeerFnInner {
    runtime: Weak<RuntimeInner>,
    fn_id: u64,
    params: Vec<TypeDesc>,
    ret: TypeDesc,
}

impl PeerFunction {
    pub(crate) fn new(rt: &Runtime, fn_id: u64, params: Vec<TypeDesc>, ret: TypeDesc) -> Self {
        Self {
            inner: Rc::new(PeerFnInner {
                runtime: rt.downgrade(),
                fn_id,
                params,
                ret,
            }),
        }
    }

    /// The peer-assigned 64-bit function ID.
    pub fn fn_id(&self) -> u64 {
        self.inner.fn_id
    }

    /// Invoke the native function synchronously.
    ///
    /// Arguments that encode through `BorrowedRef` live on the borrow stack
    /// for exactly this call; a frame guard clears them on every exit path.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let rt = Runtime::from_weak(&self.inner.runtime)?;
        if args.len() != self.inner.params.len() {
            return Err(Error::ArityMismatch {
                expected: self.inner.params.len(),
                found: args.len(),
            });
        }

        let frame = FrameGuard::push(&rt);

        let mut enc = Encoder::new();
        enc.push_u8(MSG_EVALUATE);
        enc.push_u32(INVOKE_NATIVE);
        enc.push_u64(self.inner.fn_id);
        for (param, arg) in self.inner.params.iter().zip(args) {
            marshal::encode_value(&rt, param, arg, &mut enc)?;
        }

        let reply = rt.round_trip(enc.finalize())?;
        drop(frame);

        let mut dec = reply.decoder()?;
        let value = marshal::decode_value(&rt, &self.inner.ret, &mut dec)?;
        if !dec.is_empty() {
            return Err(Error::LeftoverBytes);
        }
        Ok(value)
    }
}

impl fmt::Debug for PeerFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerFunction({})", self.inner.fn_id)
    }
}

impl PartialEq for PeerFunction {
    fn eq(&self, other: &Self) -> bool {
        self.inner.fn_id == other.inner.fn_id
    }
}

impl Drop for PeerFnInner {
    fn drop(&mut self) {
        let Some(inner) = self.runtime.upgrade() else {
            return;
        };
        let rt = Runtime { inner };

        let mut enc = Encoder::new();
        enc.push_u8(MSG_EVALUATE);
        enc.push_u32(DROP_NATIVE_REF);
        enc.push_u64(self.fn_id);
        if let Err(e) = rt.round_trip(enc.finalize()) {
            warn!("release of native fn {} failed: {e}", self.fn_id);
        }
    }
}

/// Signature table for an exported native class, keyed by method name.
pub struct PeerClass {
    name: String,
    methods: HashMap<String, Rc<FuncType>>,
}

impl PeerClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    /// Declare a method signature. Builder-style so glue can chain.
    pub fn method(mut self, name: impl Into<String>, params: Vec<TypeDesc>, ret: TypeDesc) -> Self {
        self.methods.insert(name.into(), Rc::new(FuncType::new(params, ret)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn lookup(&self, method: &str) -> Option<Rc<FuncType>> {
        self.methods.get(method).cloned()
    }
}

/// A handle to an object the peer exported.
///
/// Methods route through the reserved call-exported-method selector with a
/// `"ClassName::method"` string selector and the opaque handle. Dropping
/// the wrapper (or calling [`free`](PeerObject::free)) invokes the class's
/// `__drop` export.
pub struct PeerObject {
    runtime: Weak<RuntimeInner>,
    class: String,
    handle: Cell<u64>,
}

impl PeerObject {
    pub(crate) fn new(rt: &Runtime, class: String, handle: u64) -> Self {
        Self {
            runtime: rt.downgrade(),
            class,
            handle: Cell::new(handle),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// The opaque native handle, or 0 once freed.
    pub fn handle(&self) -> u64 {
        self.handle.get()
    }

    /// Invoke an exported method, with the signature looked up from the
    /// registered [`PeerClass`].
    pub fn call_method(&self, method: &str, args: &[Value]) -> Result<Value> {
        let rt = Runtime::from_weak(&self.runtime)?;
        let handle = self.handle.get();
        if handle == 0 {
            return Err(Error::ObjectFreed);
        }
        let sig = rt.class_method(&self.class, method)?;
        if args.len() != sig.params.len() {
            return Err(Error::ArityMismatch {
                expected: sig.params.len(),
                found: args.len(),
            });
        }

        let frame = FrameGuard::push(&rt);

        let mut enc = Encoder::new();
        enc.push_u8(MSG_EVALUATE);
        enc.push_u32(CALL_EXPORTED_METHOD);
        enc.push_str(&format!("{}::{method}", self.class));
        enc.push_u64(handle);
        for (param, arg) in sig.params.iter().zip(args) {
            marshal::encode_value(&rt, param, arg, &mut enc)?;
        }

        let reply = rt.round_trip(enc.finalize())?;
        drop(frame);

        let mut dec = reply.decoder()?;
        let value = marshal::decode_value(&rt, &sig.ret, &mut dec)?;
        if !dec.is_empty() {
            return Err(Error::LeftoverBytes);
        }
        Ok(value)
    }

    /// Release the native object via the class's `__drop` export.
    ///
    /// Idempotent: the handle is cleared first, so a second call (or the
    /// eventual drop) is a no-op.
    pub fn free(&self) -> Result<()> {
        let handle = self.handle.replace(0);
        if handle == 0 {
            return Ok(());
        }
        let rt = Runtime::from_weak(&self.runtime)?;

        let mut enc = Encoder::new();
        enc.push_u8(MSG_EVALUATE);
        enc.push_u32(CALL_EXPORTED_METHOD);
        enc.push_str(&format!("{}::__drop", self.class));
        enc.push_u64(handle);

        let reply = rt.round_trip(enc.finalize())?;
        let dec = reply.decoder()?;
        if !dec.is_empty() {
            return Err(Error::LeftoverBytes);
        }
        Ok(())
    }
}

impl fmt::Debug for PeerObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerObject({}#{})", self.class, self.handle.get())
    }
}

impl Drop for PeerObject {
    fn drop(&mut self) {
        if self.runtime.strong_count() == 0 {
            return;
        }
        if let Err(e) = self.free() {
            warn!("release of {} object failed: {e}", self.class);
        }
    }
}
