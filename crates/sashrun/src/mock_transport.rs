//! Scripted peer transports for tests.
//!
//! These are used internally by the test suite and are not part of the
//! public API.

use std::cell::RefCell;
use std::rc::Rc;

use crate::transport::Transport;

type Handler = Box<dyn Fn(&[u8]) -> Option<Vec<u8>>>;
type Recorder = Rc<RefCell<Vec<Vec<u8>>>>;

/// A peer driven by two closures, one per endpoint, with every payload
/// recorded for later assertions.
pub(crate) struct MockPeer {
    on_call: Handler,
    on_respond: Handler,
    calls: Recorder,
    responds: Recorder,
}

impl MockPeer {
    /// A peer that answers nothing on either endpoint.
    pub(crate) fn silent() -> Self {
        Self::new(|_| None, |_| None)
    }

    pub(crate) fn new(
        on_call: impl Fn(&[u8]) -> Option<Vec<u8>> + 'static,
        on_respond: impl Fn(&[u8]) -> Option<Vec<u8>> + 'static,
    ) -> Self {
        Self {
            on_call: Box::new(on_call),
            on_respond: Box::new(on_respond),
            calls: Rc::new(RefCell::new(Vec::new())),
            responds: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Handles on the recorded payloads, kept alive past the runtime.
    pub(crate) fn recorders(&self) -> (Recorder, Recorder) {
        (Rc::clone(&self.calls), Rc::clone(&self.responds))
    }
}

impl Transport for MockPeer {
    fn respond(&self, payload: &[u8]) -> Option<Vec<u8>> {
        self.responds.borrow_mut().push(payload.to_vec());
        (self.on_respond)(payload)
    }

    fn call(&self, payload: &[u8]) -> Option<Vec<u8>> {
        self.calls.borrow_mut().push(payload.to_vec());
        (self.on_call)(payload)
    }
}
