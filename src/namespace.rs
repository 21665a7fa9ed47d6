//! Namespace lifecycle.
//!
//! A [`Namespace`] is an isolated per-tenant instance of the full chain
//! table: one [`Chain`] per `(family, hooknum)` pair, plus the devices
//! registered in it (each carrying its own NETDEV ingress chain, see
//! [`crate::device`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::chain::Chain;
use crate::device::Device;
use crate::family::{Family, HookPoint};
use crate::hook::HookOps;

/// Either a namespace-table chain or a device's ingress chain — the two
/// addressing schemes named in spec §3/§4.2, unified behind one handle so
/// the registry can treat both uniformly.
pub enum ChainTarget<P> {
    Table(Arc<Chain<P>>),
    DeviceIngress(Arc<Device<P>>),
}

impl<P> ChainTarget<P> {
    pub fn chain(&self) -> &Chain<P> {
        match self {
            ChainTarget::Table(c) => c,
            ChainTarget::DeviceIngress(d) => d.ingress_chain(),
        }
    }
}

/// An isolated per-tenant instance of the full chain table.
pub struct Namespace<P> {
    id: Uuid,
    /// `chains[family.index()][hooknum.index()]`. The `Netdev` row is
    /// unused: NETDEV ingress chains live on devices, not here.
    chains: Vec<Vec<Arc<Chain<P>>>>,
    devices: RwLock<HashMap<String, Arc<Device<P>>>>,
    /// Per-`(family, hooknum)` "hook present" counters callers can check
    /// to skip the engine entirely when zero (spec §6).
    present: Vec<Vec<AtomicU64>>,
}

impl<P> Namespace<P> {
    /// Allocate an empty chain table for a new namespace. Does not replay
    /// the global hooks list — that is [`crate::registry::Registry`]'s job,
    /// since replay can fail and the registry owns rollback semantics.
    pub fn new() -> Self {
        let mut chains = Vec::with_capacity(Family::COUNT);
        let mut present = Vec::with_capacity(Family::COUNT);
        for _ in 0..Family::COUNT {
            let mut row = Vec::with_capacity(HookPoint::COUNT);
            let mut prow = Vec::with_capacity(HookPoint::COUNT);
            for _ in 0..HookPoint::COUNT {
                row.push(Arc::new(Chain::new()));
                prow.push(AtomicU64::new(0));
            }
            chains.push(row);
            present.push(prow);
        }
        Self {
            id: Uuid::new_v4(),
            chains,
            devices: RwLock::new(HashMap::new()),
            present,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn add_device(&self, device: Arc<Device<P>>) {
        self.devices.write().insert(device.name().to_string(), device);
    }

    pub fn device(&self, name: &str) -> Option<Arc<Device<P>>> {
        self.devices.read().get(name).cloned()
    }

    pub fn devices_snapshot(&self) -> Vec<Arc<Device<P>>> {
        self.devices.read().values().cloned().collect()
    }

    /// `find_chain`: resolves the target chain for `ops`, or `None` if it
    /// doesn't exist (e.g. a NETDEV ingress hook naming a device that
    /// isn't in this namespace).
    pub fn find_chain(&self, ops: &HookOps<P>) -> Option<ChainTarget<P>> {
        if ops.family == Family::Netdev {
            if ops.hooknum != HookPoint::Ingress {
                return None;
            }
            let device_name = ops.device.as_deref()?;
            let device = self.device(device_name)?;
            return Some(ChainTarget::DeviceIngress(device));
        }
        let chain = self.chains[ops.family.index()][ops.hooknum.index()].clone();
        Some(ChainTarget::Table(chain))
    }

    pub fn chain_at(&self, family: Family, hooknum: HookPoint) -> Arc<Chain<P>> {
        self.chains[family.index()][hooknum.index()].clone()
    }

    pub(crate) fn present_flag(&self, family: Family, hooknum: HookPoint) -> &AtomicU64 {
        &self.present[family.index()][hooknum.index()]
    }

    pub fn has_hooks(&self, family: Family, hooknum: HookPoint) -> bool {
        self.present_flag(family, hooknum).load(Ordering::Acquire) > 0
    }
}

impl<P> Default for Namespace<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::HookState;
    use crate::verdict::Verdict;
    use std::sync::Arc as StdArc;

    fn netdev_ingress_ops(device: &str) -> HookOps<u8> {
        HookOps {
            family: Family::Netdev,
            hooknum: HookPoint::Ingress,
            priority: 0,
            callback: StdArc::new(|_: &_, _: &mut u8, _: &HookState<'_, u8>| Verdict::Accept),
            private: StdArc::new(()),
            device: Some(device.to_string()),
        }
    }

    #[test]
    fn find_chain_resolves_a_registered_device_ingress_chain() {
        let ns: Namespace<u8> = Namespace::new();
        let device = Arc::new(Device::new("eth0"));
        ns.add_device(device.clone());

        let target = ns.find_chain(&netdev_ingress_ops("eth0")).expect("device is present");
        match target {
            ChainTarget::DeviceIngress(d) => assert_eq!(d.name(), "eth0"),
            ChainTarget::Table(_) => panic!("expected a device ingress target"),
        }
    }

    #[test]
    fn find_chain_is_none_for_a_device_outside_the_namespace() {
        let ns: Namespace<u8> = Namespace::new();
        assert!(ns.find_chain(&netdev_ingress_ops("eth0")).is_none());
    }

    #[test]
    fn ingress_hooks_insert_into_the_devices_own_chain_not_the_table() {
        let ns: Namespace<u8> = Namespace::new();
        let device = Arc::new(Device::new("eth0"));
        ns.add_device(device.clone());

        let ChainTarget::DeviceIngress(target_device) = ns.find_chain(&netdev_ingress_ops("eth0")).unwrap() else {
            panic!("expected a device ingress target");
        };
        target_device.ingress_chain().insert(netdev_ingress_ops("eth0"));

        assert_eq!(device.ingress_chain().len(), 1);
    }
}
