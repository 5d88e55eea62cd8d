// ABOUTME: Slot store backing the pool: an atomically published array of
// connection slots with grow-only resizing and per-slot reference swaps

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::conn::PoolConn;

/// One fixed-index storage location holding at most one connection
#[derive(Default)]
struct Slot {
    conn: ArcSwapOption<PoolConn>,
}

/// Growable, lock-free array of connection slots
///
/// The backing array is an immutable snapshot behind a single atomic
/// reference: `grow` allocates a new array, copies the current slot values
/// in, and publishes it with one store. Readers holding the old snapshot are
/// unaffected; they keep operating on the slots they loaded. Individual slot
/// contents are replaced by atomic reference swap, never by mutating a
/// `PoolConn` in place.
pub(crate) struct Slots {
    table: ArcSwap<Vec<Slot>>,
}

impl Slots {
    /// Allocate `size` empty slots and publish them
    pub(crate) fn new(size: usize) -> Self {
        Self {
            table: ArcSwap::from_pointee(empty_table(size)),
        }
    }

    /// Number of slots in the current snapshot
    pub(crate) fn len(&self) -> usize {
        self.table.load().len()
    }

    /// Load the connection at `idx`
    ///
    /// Returns `None` for an empty slot or an out-of-bounds index.
    pub(crate) fn load(&self, idx: usize) -> Option<Arc<PoolConn>> {
        self.table.load().get(idx).and_then(|slot| slot.conn.load_full())
    }

    /// Replace the connection at `idx`; out-of-bounds stores are dropped
    pub(crate) fn store(&self, idx: usize, conn: Option<Arc<PoolConn>>) {
        if let Some(slot) = self.table.load().get(idx) {
            slot.conn.store(conn);
        }
    }

    /// Replace the connection at `idx`, returning the previous occupant
    pub(crate) fn swap(&self, idx: usize, conn: Option<Arc<PoolConn>>) -> Option<Arc<PoolConn>> {
        self.table
            .load()
            .get(idx)
            .and_then(|slot| slot.conn.swap(conn))
    }

    /// Grow to `size` slots, preserving existing values at their indices
    ///
    /// No-op unless `size` exceeds the current length. Stores racing the
    /// copy against the old snapshot can be lost; callers re-assert slot
    /// contents through refresh rather than relying on ordering here.
    pub(crate) fn grow(&self, size: usize) {
        let current = self.table.load_full();
        if size <= current.len() {
            return;
        }

        let grown = empty_table(size);
        for (idx, slot) in current.iter().enumerate() {
            grown[idx].conn.store(slot.conn.load_full());
        }
        self.table.store(Arc::new(grown));
    }

    /// Publish a fresh all-empty array of the current size
    pub(crate) fn flush(&self) {
        let size = self.len();
        self.table.store(Arc::new(empty_table(size)));
    }
}

fn empty_table(size: usize) -> Vec<Slot> {
    let mut table = Vec::with_capacity(size);
    table.resize_with(size, Slot::default);
    table
}
