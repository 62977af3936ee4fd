//! # The Object Heap
//!
//! Stable numeric identities for values held by the native peer. Both sides
//! of the boundary advance the same counters in lock-step, so identities
//! are derivable rather than transmitted: heap IDs never travel on the wire
//! for insertions, only for lookups.
//!
//! The ID space is partitioned:
//!
//! - **1–127** — the borrow stack: short-lived references that exist for
//!   one cross-boundary operation, growing downward from 128.
//! - **128–131** — four reserved constants: `undefined`, `null`, `true`,
//!   `false`, pre-bound and never freed.
//! - **132 and up** — the allocated range, minted by a monotonic
//!   water-mark. Freed IDs go to a free list but are never re-minted; the
//!   peer speculates on future IDs while assembling a batch, and reuse
//!   would desynchronise the two sides.

use crate::error::Error;
use crate::error::Result;
use crate::value::Value;

/// Initial borrow-stack pointer; the stack occupies IDs 1–127 below it.
pub const BORROW_BASE: u64 = 128;

pub const IDX_UNDEFINED: u64 = 128;
pub const IDX_NULL: u64 = 129;
pub const IDX_TRUE: u64 = 130;
pub const IDX_FALSE: u64 = 131;

/// First ID in the allocated range.
pub const FIRST_HEAP_ID: u64 = 132;

/// A pre-announced run of IDs that return-value references fill in order.
#[derive(Debug)]
struct Reservation {
    start: u64,
    count: u32,
    next: u32,
}

/// The slotted object heap.
pub struct Heap {
    /// Borrow slots, indexed directly by ID (index 0 and 128+ unused).
    borrow: Vec<Option<Value>>,
    /// Allocated slots; index `i` holds ID `FIRST_HEAP_ID + i`.
    slots: Vec<Option<Value>>,
    free: Vec<u64>,
    borrow_ptr: u64,
    frames: Vec<u64>,
    reservations: Vec<Reservation>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            borrow: (0..BORROW_BASE).map(|_| None).collect(),
            slots: Vec::new(),
            free: Vec::new(),
            borrow_ptr: BORROW_BASE,
            frames: Vec::new(),
            reservations: Vec::new(),
        }
    }

    /// The next unused allocated ID. Monotonically non-decreasing.
    pub fn water_mark(&self) -> u64 {
        FIRST_HEAP_ID + self.slots.len() as u64
    }

    /// Store `value` at the water-mark and return its ID.
    ///
    /// Freed IDs are deliberately not reused here; see the module docs.
    pub fn insert(&mut self, value: Value) -> u64 {
        let id = self.water_mark();
        self.slots.push(Some(value));
        id
    }

    /// Resolve any ID: special, borrow-stack, or allocated.
    pub fn get(&self, id: u64) -> Result<Value> {
        match id {
            IDX_UNDEFINED => Ok(Value::Undefined),
            IDX_NULL => Ok(Value::Null),
            IDX_TRUE => Ok(Value::Bool(true)),
            IDX_FALSE => Ok(Value::Bool(false)),
            id if id >= 1 && id < BORROW_BASE => self
                .borrow
                .get(id as usize)
                .and_then(|slot| slot.clone())
                .ok_or(Error::UnknownHandle(id)),
            id if id >= FIRST_HEAP_ID => self
                .slots
                .get((id - FIRST_HEAP_ID) as usize)
                .and_then(|slot| slot.clone())
                .ok_or(Error::UnknownHandle(id)),
            _ => Err(Error::UnknownHandle(id)),
        }
    }

    /// Clear an allocated slot and free-list its ID. IDs below the
    /// allocated range are a no-op. Returns the evicted value so the caller
    /// can drop it outside any heap borrow.
    pub fn remove(&mut self, id: u64) -> Option<Value> {
        if id < FIRST_HEAP_ID {
            return None;
        }
        let slot = self.slots.get_mut((id - FIRST_HEAP_ID) as usize)?;
        let value = slot.take()?;
        self.free.push(id);
        Some(value)
    }

    /// True iff `id` is in the allocated range and currently bound.
    pub fn has(&self, id: u64) -> bool {
        id >= FIRST_HEAP_ID
            && self
                .slots
                .get((id - FIRST_HEAP_ID) as usize)
                .is_some_and(|slot| slot.is_some())
    }

    /// Allocated slots minus the free list.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Push a temporary reference onto the borrow stack, returning its ID.
    pub fn add_borrowed_ref(&mut self, value: Value) -> Result<u64> {
        if self.borrow_ptr <= 1 {
            return Err(Error::BorrowStackOverflow);
        }
        self.borrow_ptr -= 1;
        self.borrow[self.borrow_ptr as usize] = Some(value);
        Ok(self.borrow_ptr)
    }

    /// Save the borrow-stack pointer. Frames nest.
    pub fn push_borrow_frame(&mut self) {
        self.frames.push(self.borrow_ptr);
    }

    /// Restore the borrow-stack pointer, clearing every entry the frame
    /// covered. Returns the cleared values so the caller can drop them
    /// outside any heap borrow.
    pub fn pop_borrow_frame(&mut self) -> Vec<Value> {
        let saved = self.frames.pop().expect("borrow frame stack underflow");
        let mut cleared = Vec::new();
        for id in self.borrow_ptr..saved {
            if let Some(value) = self.borrow[id as usize].take() {
                cleared.push(value);
            }
        }
        self.borrow_ptr = saved;
        cleared
    }

    /// Current borrow-stack pointer (for tests and diagnostics).
    pub fn borrow_pointer(&self) -> u64 {
        self.borrow_ptr
    }

    /// Advance the water-mark past `count` placeholder IDs the peer has
    /// already handed out for return values. Scopes nest; the innermost is
    /// the active one.
    pub fn push_reservation_scope(&mut self, count: u32) {
        let start = self.water_mark();
        self.slots.extend((0..count).map(|_| None));
        self.reservations.push(Reservation { start, count, next: 0 });
    }

    pub fn pop_reservation_scope(&mut self) {
        self.reservations.pop().expect("reservation scope stack underflow");
    }

    /// Bind the next placeholder in the active scope, returning its ID.
    pub fn fill_next_reserved(&mut self, value: Value) -> Result<u64> {
        let scope = self.reservations.last_mut().ok_or(Error::ReservationExhausted)?;
        if scope.next >= scope.count {
            return Err(Error::ReservationExhausted);
        }
        let id = scope.start + scope.next as u64;
        scope.next += 1;
        self.slots[(id - FIRST_HEAP_ID) as usize] = Some(value);
        Ok(id)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
