//! The injected table of locally callable functions.
//!
//! The runtime does not define the catalog of callables; generated glue
//! (or a test) installs it. Entries are plain `Fn` values behind `Rc` so a
//! function can re-enter the dispatch loop while the registry itself is
//! not borrowed.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;
use crate::value::Value;

/// A locally registered callable.
pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value>>;

/// Function table indexed by the 32-bit IDs the peer dispatches on.
#[derive(Default)]
pub struct FunctionRegistry {
    funcs: HashMap<u32, NativeFn>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, func: impl Fn(&[Value]) -> Result<Value> + 'static) {
        self.funcs.insert(id, Rc::new(func));
    }

    /// Clone the entry out so the registry borrow can end before the call.
    pub fn get(&self, id: u32) -> Option<NativeFn> {
        self.funcs.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}
