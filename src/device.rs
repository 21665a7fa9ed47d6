//! NETDEV ingress device model.
//!
//! Chains for `(Family::Netdev, HookPoint::Ingress)` live on the device
//! object rather than in a namespace's chain table (spec §3, §4.2). A
//! device also carries the ingress-active counter fast paths read to
//! decide whether to enter the engine at all (spec §6).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::chain::Chain;

/// One network device, as seen by the hook framework. Real device state
/// (link layer, queues, ...) is out of scope; this models only the slice
/// the registry and engine touch.
pub struct Device<P> {
    name: String,
    ingress_chain: Arc<Chain<P>>,
    ingress_active: AtomicUsize,
}

impl<P> Device<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ingress_chain: Arc::new(Chain::new()),
            ingress_active: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ingress_chain(&self) -> &Chain<P> {
        &self.ingress_chain
    }

    pub fn ingress_chain_arc(&self) -> Arc<Chain<P>> {
        self.ingress_chain.clone()
    }

    pub(crate) fn inc_ingress_active(&self) {
        self.ingress_active.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn dec_ingress_active(&self) {
        self.ingress_active.fetch_sub(1, Ordering::AcqRel);
    }

    /// Fast-path gate: skip entering the engine entirely when no ingress
    /// hook is registered on this device.
    pub fn has_ingress_hooks(&self) -> bool {
        self.ingress_active.load(Ordering::Acquire) > 0
    }
}
