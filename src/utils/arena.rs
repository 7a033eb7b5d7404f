//! Tick-scoped buffer pool for collision queries.
//!
//! Every spatial query writes into a caller-owned [`FixedVec`] instead of
//! allocating. The [`TickArena`] recycles those buffers across calls so the
//! steady-state hot path touches the allocator only while a level warms up.
//! Buffers taken from the arena must be returned before the tick ends;
//! nothing taken from it may outlive the tick that produced it.

use glam::IVec3;
use log::trace;

use crate::entity::base::EntityId;
use crate::utils::math::AABB;

/// A vector that refuses to grow past the capacity it was created with.
///
/// `push` reports fullness instead of reallocating, which is what turns
/// "too many colliders" into an overflow signal rather than a heap hit.
#[derive(Debug)]
pub struct FixedVec<T> {
    items: Vec<T>,
    cap: usize,
}

impl<T> FixedVec<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            items: Vec::with_capacity(cap),
            cap,
        }
    }

    /// Appends `value` if there is room. Returns false when full; the
    /// buffer is left untouched in that case.
    #[must_use]
    pub fn push(&mut self, value: T) -> bool {
        if self.items.len() >= self.cap {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.cap
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Re-arms a recycled buffer for a new capacity, keeping its backing
    /// storage when it is already large enough.
    fn rearm(&mut self, cap: usize) {
        self.items.clear();
        if cap > self.items.capacity() {
            self.items.reserve(cap - self.items.capacity());
        }
        self.cap = cap;
    }
}

/// Pool of query buffers reset once per simulation tick.
///
/// Follows an acquire/release discipline: `take_*` hands out a buffer,
/// `put_*` returns it for reuse. [`TickArena::reset`] runs at the start of
/// every tick and asserts (in debug builds) that nothing leaked across the
/// tick boundary.
#[derive(Debug, Default)]
pub struct TickArena {
    colliders: Vec<FixedVec<AABB>>,
    ids: Vec<FixedVec<EntityId>>,
    offsets: Vec<FixedVec<IVec3>>,
    outstanding: usize,
}

impl TickArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_colliders(&mut self, cap: usize) -> FixedVec<AABB> {
        self.outstanding += 1;
        match self.colliders.pop() {
            Some(mut buf) => {
                buf.rearm(cap);
                buf
            }
            None => {
                trace!("tick arena grows a collider buffer (cap {cap})");
                FixedVec::new(cap)
            }
        }
    }

    pub fn put_colliders(&mut self, buf: FixedVec<AABB>) {
        self.outstanding -= 1;
        self.colliders.push(buf);
    }

    pub fn take_ids(&mut self, cap: usize) -> FixedVec<EntityId> {
        self.outstanding += 1;
        match self.ids.pop() {
            Some(mut buf) => {
                buf.rearm(cap);
                buf
            }
            None => {
                trace!("tick arena grows an id buffer (cap {cap})");
                FixedVec::new(cap)
            }
        }
    }

    pub fn put_ids(&mut self, buf: FixedVec<EntityId>) {
        self.outstanding -= 1;
        self.ids.push(buf);
    }

    pub fn take_offsets(&mut self, cap: usize) -> FixedVec<IVec3> {
        self.outstanding += 1;
        match self.offsets.pop() {
            Some(mut buf) => {
                buf.rearm(cap);
                buf
            }
            None => FixedVec::new(cap),
        }
    }

    pub fn put_offsets(&mut self, buf: FixedVec<IVec3>) {
        self.outstanding -= 1;
        self.offsets.push(buf);
    }

    /// Marks the tick boundary. Buffers handed out during the previous tick
    /// must all be back by now.
    pub fn reset(&mut self) {
        debug_assert_eq!(
            self.outstanding, 0,
            "query buffer leaked across a tick boundary"
        );
        self.outstanding = 0;
    }

    /// Number of pooled buffers currently idle, for diagnostics.
    pub fn idle_buffers(&self) -> usize {
        self.colliders.len() + self.ids.len() + self.offsets.len()
    }
}
