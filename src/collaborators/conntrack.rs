//! Connection-tracking attach/destroy trampolines (optional).
//!
//! The source exposes these as two raw function pointers,
//! `ip_ct_attach`/`nf_ct_destroy`, invoked from the data path under an RCU
//! read region, with `nf_ct_destroy` asserting (`BUG_ON`) if no destroy
//! hook is installed. Connection tracking itself is out of scope (spec
//! §1); only this publish/read seam is modeled.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::grace::GracePeriod;

/// A fresh packet `new` was cloned from `old`; propagate `old`'s
/// connection-tracking state onto `new`.
pub trait ConntrackAttach<P>: Send + Sync {
    fn attach(&self, new: &mut P, old: &P);
}

/// Release a connection-tracking entry. Invoked from the data path; must
/// not block.
pub trait ConntrackDestroy: Send + Sync {
    fn destroy(&self, conntrack_id: u64);
}

/// Publishes the two trampolines and lets the data path read through a
/// [`GracePeriod`] reader region, exactly like [`crate::chain::Chain`].
pub struct ConntrackHooks<P> {
    attach: ArcSwap<Option<Arc<dyn ConntrackAttach<P>>>>,
    destroy: ArcSwap<Option<Arc<dyn ConntrackDestroy>>>,
    grace: GracePeriod,
}

impl<P> Default for ConntrackHooks<P> {
    fn default() -> Self {
        Self {
            attach: ArcSwap::from_pointee(None),
            destroy: ArcSwap::from_pointee(None),
            grace: GracePeriod::new(),
        }
    }
}

impl<P> ConntrackHooks<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attach(&self, hook: Arc<dyn ConntrackAttach<P>>) {
        self.attach.store(Arc::new(Some(hook)));
    }

    pub fn set_destroy(&self, hook: Arc<dyn ConntrackDestroy>) {
        self.destroy.store(Arc::new(Some(hook)));
    }

    pub fn clear(&self) {
        self.attach.store(Arc::new(None));
        self.destroy.store(Arc::new(None));
        self.grace.synchronize();
    }

    /// `nf_ct_attach`: only invoked when the packet actually carries
    /// connection-tracking state, so a missing hook is not an error.
    pub fn attach(&self, new: &mut P, old: &P) {
        let _region = self.grace.enter();
        if let Some(hook) = &*self.attach.load_full() {
            hook.attach(new, old);
        }
    }

    /// `nf_conntrack_destroy`: the source `BUG_ON`s when no destroy hook
    /// is installed, because reaching this point with conntrack enabled
    /// but no destroy hook is a programming error, not a data error (spec
    /// §7). A conntrack-carrying packet calling destroy with no hook
    /// installed indicates exactly that.
    pub fn destroy(&self, conntrack_id: u64) {
        let _region = self.grace.enter();
        match &*self.destroy.load_full() {
            Some(hook) => hook.destroy(conntrack_id),
            None => unreachable!("nf_conntrack_destroy called with no destroy hook installed"),
        }
    }
}
