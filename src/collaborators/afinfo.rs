//! Per-family helper table (`nf_afinfo` in the source): checksum,
//! reassembly and route helpers used by callbacks. Registration publishes
//! under a dedicated mutex using the same quiescence scheme as chains;
//! unregistration waits one grace period before returning.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::family::Family;
use crate::grace::GracePeriod;

/// Checksum/reassembly/route helpers for one protocol family. The concrete
/// operations are out of scope for this crate (see spec §1); only the
/// publish/read/retire seam is modeled, via an opaque handle.
pub trait AfInfo: Send + Sync {
    fn family(&self) -> Family;
}

/// Table of per-family helpers, indexed by [`Family`].
pub struct AfInfoTable {
    slots: Vec<ArcSwap<Option<Arc<dyn AfInfo>>>>,
    mutex: Mutex<()>,
    grace: GracePeriod,
}

impl Default for AfInfoTable {
    fn default() -> Self {
        let mut slots = Vec::with_capacity(Family::COUNT);
        for _ in 0..Family::COUNT {
            slots.push(ArcSwap::from_pointee(None));
        }
        Self {
            slots,
            mutex: Mutex::new(()),
            grace: GracePeriod::new(),
        }
    }
}

impl AfInfoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the helper currently published for `family`, if any. Readers
    /// hold a [`crate::grace::ReaderGuard`] only for the duration of the
    /// `Arc` clone.
    pub fn get(&self, family: Family) -> Option<Arc<dyn AfInfo>> {
        let _region = self.grace.enter();
        (*self.slots[family.index()].load_full()).clone()
    }

    pub fn register(&self, helper: Arc<dyn AfInfo>) {
        let _lock = self.mutex.lock();
        let family = helper.family();
        self.slots[family.index()].store(Arc::new(Some(helper)));
    }

    /// Publish `None` for `family`, then wait one grace period before
    /// returning — matching the source's `synchronize_rcu()` after
    /// `nf_unregister_afinfo`.
    pub fn unregister(&self, family: Family) {
        let _lock = self.mutex.lock();
        self.slots[family.index()].store(Arc::new(None));
        drop(_lock);
        self.grace.synchronize();
    }
}
