//! Chain store: an ordered, lock-free-to-read list of [`HookEntry`].
//!
//! A chain is a copy-on-write snapshot (`Arc<[HookEntry<P>]>`) published
//! through an [`ArcSwap`]. Readers `load()` once at the start of a
//! traversal and iterate the immutable slice they got — a concurrent
//! writer installing a new snapshot cannot invalidate it, so a reader can
//! never observe a torn or freed entry, and an entry removed mid-traversal
//! by another thread simply stays alive (via `Arc` refcounting) until this
//! traversal's snapshot is dropped. This is the publication half of the
//! protocol described in spec §4.4; [`crate::grace::GracePeriod`] supplies
//! the explicit wait half used elsewhere (e.g. before notifying the queue
//! subsystem to drop parked packets).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::warn;

use crate::hook::{HookEntry, HookOps, HookToken};

/// An ordered chain of hook entries, addressable by `(namespace, family,
/// hooknum)` except for NETDEV ingress chains which a [`crate::device`]
/// owns directly.
pub struct Chain<P> {
    snapshot: ArcSwap<Vec<HookEntry<P>>>,
    next_seq: AtomicU64,
}

impl<P> Default for Chain<P> {
    fn default() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }
}

impl<P> Chain<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the current snapshot for a traversal. Cheap: one atomic
    /// load and an `Arc` clone, never blocks.
    pub fn load(&self) -> Arc<Vec<HookEntry<P>>> {
        self.snapshot.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Insert `ops` in priority order: splice it immediately before the
    /// first existing entry with strictly greater priority, appending at
    /// the tail if none exists. Ties preserve registration order via the
    /// entry's sequence number.
    ///
    /// Must be called with the registry mutex held by the caller (the
    /// chain itself only guards the snapshot pointer, not read-modify-write
    /// races between concurrent writers).
    pub fn insert(&self, ops: HookOps<P>) -> HookToken {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = HookEntry::new(ops, seq);
        let token = entry.token();

        let current = self.snapshot.load();
        let mut next: Vec<HookEntry<P>> = Vec::with_capacity(current.len() + 1);
        let mut inserted = false;
        for existing in current.iter() {
            if !inserted && entry.priority() < existing.priority() {
                next.push(clone_entry(&entry));
                inserted = true;
            }
            next.push(clone_entry(existing));
        }
        if !inserted {
            next.push(entry);
        }
        self.snapshot.store(Arc::new(next));
        token
    }

    /// Locate and unlink the entry identified by `token`, returning it. If
    /// not found, logs a warning and returns `None` (spec §4.2, §7).
    pub fn remove(&self, token: HookToken) -> Option<HookEntry<P>> {
        let current = self.snapshot.load();
        let pos = current.iter().position(|e| e.token() == token);
        let Some(pos) = pos else {
            warn!("attempted to unregister hook {token} not present in its chain");
            return None;
        };

        let mut next: Vec<HookEntry<P>> = Vec::with_capacity(current.len() - 1);
        let mut removed = None;
        for (i, existing) in current.iter().enumerate() {
            if i == pos {
                removed = Some(clone_entry(existing));
            } else {
                next.push(clone_entry(existing));
            }
        }
        self.snapshot.store(Arc::new(next));
        removed
    }
}

/// `HookEntry` deliberately has no `Clone` impl on its public surface (an
/// entry is registry-owned and should not be duplicated in place), but the
/// copy-on-write chain needs to build a new `Vec` containing the unchanged
/// entries verbatim. This helper does that by value-copying the fields
/// rather than exposing a misleading public `Clone`.
fn clone_entry<P>(entry: &HookEntry<P>) -> HookEntry<P> {
    HookEntry {
        token: entry.token,
        ops: entry.ops.clone(),
        seq: entry.seq,
    }
}
