//! Registry API: register/unregister a hook, an array of hooks, or a
//! global hook replayed into every namespace.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::collaborators::queue::QueueCollaborator;
use crate::error::RegisterError;
use crate::family::{Family, HookPoint};
use crate::grace::GracePeriod;
use crate::hook::{HookOps, HookToken};
use crate::namespace::{ChainTarget, Namespace};

/// One hook registered across every namespace. Tracks the token it was
/// assigned in each namespace so `unregister_hook` can remove it
/// everywhere, including namespaces created (and replayed into) after the
/// initial global registration.
struct GlobalHook<P> {
    ops: HookOps<P>,
    tokens: Mutex<HashMap<Uuid, HookToken>>,
}

/// Owns every namespace's chain tables and the global hooks list; the
/// single point of mutation for the whole framework. Registration is rare
/// and fully serialized; the data path never goes through this type.
pub struct Registry<P> {
    namespaces: parking_lot::RwLock<HashMap<Uuid, Arc<Namespace<P>>>>,
    global_hooks: Mutex<Vec<GlobalHook<P>>>,
    /// Serializes all chain mutation (`nf_hook_mutex` in the source).
    hook_mutex: Mutex<()>,
    /// Serializes namespace enumeration (`rtnl_lock` in the source) —
    /// distinct from `hook_mutex` because global (un)registration needs
    /// to hold the namespace set stable across many per-namespace
    /// registrations.
    ns_enum_lock: Mutex<()>,
    grace: GracePeriod,
    queue: Arc<dyn QueueCollaborator<P>>,
}

impl<P> Registry<P> {
    pub fn new(queue: Arc<dyn QueueCollaborator<P>>) -> Self {
        Self {
            namespaces: parking_lot::RwLock::new(HashMap::new()),
            global_hooks: Mutex::new(Vec::new()),
            hook_mutex: Mutex::new(()),
            ns_enum_lock: Mutex::new(()),
            grace: GracePeriod::new(),
            queue,
        }
    }

    /// Create a new, empty namespace, then replay the global hooks list
    /// into it (spec §4.6). Replay tolerates `NoSuchTarget` per hook, since
    /// not every global hook targets every namespace's chain shape.
    pub fn create_namespace(&self) -> Arc<Namespace<P>> {
        let ns = Arc::new(Namespace::new());
        let _enum_guard = self.ns_enum_lock.lock();
        let globals = self.global_hooks.lock();
        for global in globals.iter() {
            match self.register_into(&ns, global.ops.clone()) {
                Ok(token) => {
                    global.tokens.lock().insert(ns.id(), token);
                }
                Err(RegisterError::NoSuchTarget) => {}
                Err(e) => {
                    warn!("global hook replay failed on new namespace: {e}");
                }
            }
        }
        drop(globals);
        self.namespaces.write().insert(ns.id(), ns.clone());
        ns
    }

    /// Drain every chain in `ns` (unregister every remaining entry,
    /// including device ingress chains), then drop it from the namespace
    /// set.
    pub fn destroy_namespace(&self, ns: &Arc<Namespace<P>>) {
        let _enum_guard = self.ns_enum_lock.lock();
        for family_idx in 0..Family::COUNT {
            for hook_idx in 0..HookPoint::COUNT {
                let family = family_index_to_family(family_idx);
                let hooknum = hook_index_to_hookpoint(hook_idx);
                if family == Family::Netdev {
                    continue;
                }
                let chain = ns.chain_at(family, hooknum);
                self.drain_chain(&chain, family, hooknum, &ns.id(), None);
            }
        }
        for device in ns.devices_snapshot() {
            let chain = device.ingress_chain_arc();
            self.drain_chain(&chain, Family::Netdev, HookPoint::Ingress, &ns.id(), Some(device));
        }
        self.namespaces.write().remove(&ns.id());
    }

    fn drain_chain(
        &self,
        chain: &Arc<crate::chain::Chain<P>>,
        family: Family,
        hooknum: HookPoint,
        ns_id: &Uuid,
        device: Option<Arc<crate::device::Device<P>>>,
    ) {
        loop {
            let snapshot = chain.load();
            let Some(entry) = snapshot.first() else { break };
            let token = entry.token();
            drop(snapshot);
            let is_netdev_ingress = family == Family::Netdev && hooknum == HookPoint::Ingress;
            self.unregister_direct(chain, token, family, hooknum, ns_id, device.clone().map(|d| (d, is_netdev_ingress)));
        }
    }

    /// `register_net_hook`: register a single hook against `ns`.
    pub fn register_net_hook(&self, ns: &Arc<Namespace<P>>, ops: HookOps<P>) -> Result<HookToken, RegisterError> {
        self.register_into(ns, ops)
    }

    fn register_into(&self, ns: &Arc<Namespace<P>>, ops: HookOps<P>) -> Result<HookToken, RegisterError> {
        let target = ns.find_chain(&ops).ok_or(RegisterError::NoSuchTarget)?;
        let family = ops.family;
        let hooknum = ops.hooknum;
        let is_netdev_ingress = family == Family::Netdev && hooknum == HookPoint::Ingress;

        let token = {
            let _lock = self.hook_mutex.lock();
            target.chain().insert(ops)
        };

        if is_netdev_ingress {
            if let ChainTarget::DeviceIngress(device) = &target {
                device.inc_ingress_active();
            }
        }
        ns.present_flag(family, hooknum).fetch_add(1, Ordering::AcqRel);

        debug!("registered hook {token} on {family:?}/{hooknum:?}");
        Ok(token)
    }

    /// `unregister_net_hook`: remove the hook identified by `token` from
    /// the chain named by `(family, hooknum[, device])`. Silently returns
    /// if the chain doesn't exist; logs and returns if the token isn't
    /// found in it (spec §4.3, §7).
    pub fn unregister_net_hook(&self, ns: &Arc<Namespace<P>>, ops: &HookOps<P>, token: HookToken) {
        let Some(target) = ns.find_chain(ops) else { return };
        self.unregister_target(&target, token, ops.family, ops.hooknum, &ns.id());
    }

    fn unregister_target(
        &self,
        target: &ChainTarget<P>,
        token: HookToken,
        family: Family,
        hooknum: HookPoint,
        ns_id: &Uuid,
    ) {
        let is_netdev_ingress = family == Family::Netdev && hooknum == HookPoint::Ingress;
        let device = match target {
            ChainTarget::DeviceIngress(d) => Some(d.clone()),
            ChainTarget::Table(_) => None,
        };
        self.unregister_direct(target.chain(), token, family, hooknum, ns_id, device.map(|d| (d, is_netdev_ingress)));
    }

    fn unregister_direct(
        &self,
        chain: &crate::chain::Chain<P>,
        token: HookToken,
        family: Family,
        hooknum: HookPoint,
        ns_id: &Uuid,
        device: Option<(Arc<crate::device::Device<P>>, bool)>,
    ) {
        let removed = {
            let _lock = self.hook_mutex.lock();
            chain.remove(token)
        };
        let Some(_removed) = removed else {
            return;
        };

        if let Some((device, true)) = device {
            device.dec_ingress_active();
        }
        if let Some(namespaces) = self.namespaces.read().get(ns_id) {
            namespaces.present_flag(family, hooknum).fetch_sub(1, Ordering::AcqRel);
        }

        // First quiescence: every reader that began traversal before the
        // unlink has now exited.
        self.grace.synchronize();
        self.queue.drop_parked(token);
        // Second quiescence: a CPU may still be dereferencing the entry
        // through a queued-verdict path that started before the first
        // wait returned but observed the entry only via the queue
        // collaborator, not the chain snapshot.
        self.grace.synchronize();
        debug!("unregistered hook {token} from {family:?}/{hooknum:?}");
    }

    /// `register_net_hooks`: register entries pairwise; on partial
    /// failure, roll back all previously successful registrations in
    /// reverse order.
    pub fn register_net_hooks(&self, ns: &Arc<Namespace<P>>, ops: Vec<HookOps<P>>) -> Result<Vec<HookToken>, RegisterError> {
        let mut tokens = Vec::with_capacity(ops.len());
        let mut registered: Vec<(HookOps<P>, HookToken)> = Vec::with_capacity(ops.len());
        for op in ops {
            match self.register_into(ns, op.clone()) {
                Ok(token) => {
                    tokens.push(token);
                    registered.push((op, token));
                }
                Err(e) => {
                    for (rolled_ops, rolled_token) in registered.into_iter().rev() {
                        self.unregister_net_hook(ns, &rolled_ops, rolled_token);
                    }
                    return Err(e);
                }
            }
        }
        Ok(tokens)
    }

    /// `unregister_net_hooks`: unregister entries in reverse order.
    pub fn unregister_net_hooks(&self, ns: &Arc<Namespace<P>>, entries: Vec<(HookOps<P>, HookToken)>) {
        for (ops, token) in entries.into_iter().rev() {
            self.unregister_net_hook(ns, &ops, token);
        }
    }

    /// `register_hook` (global): register `ops` into every existing
    /// namespace under the namespace-enumeration lock, tolerating
    /// `NoSuchTarget` per namespace; on any other error, roll back all
    /// preceding namespaces. On success, append to the global hooks list
    /// so future namespaces replay it too.
    pub fn register_hook(&self, ops: HookOps<P>) -> Result<(), RegisterError> {
        let _enum_guard = self.ns_enum_lock.lock();
        let namespaces = self.namespaces.read();
        let mut succeeded: Vec<(Arc<Namespace<P>>, HookToken)> = Vec::new();
        let mut tokens = HashMap::new();

        for ns in namespaces.values() {
            match self.register_into(ns, ops.clone()) {
                Ok(token) => {
                    succeeded.push((ns.clone(), token));
                    tokens.insert(ns.id(), token);
                }
                Err(RegisterError::NoSuchTarget) => {}
                Err(e) => {
                    for (rolled_ns, rolled_token) in succeeded.into_iter().rev() {
                        self.unregister_net_hook(&rolled_ns, &ops, rolled_token);
                    }
                    return Err(e);
                }
            }
        }
        drop(namespaces);

        self.global_hooks.lock().push(GlobalHook {
            ops,
            tokens: Mutex::new(tokens),
        });
        Ok(())
    }

    /// `unregister_hook` (global): remove from the global list and
    /// unregister from every namespace it was replayed into.
    pub fn unregister_hook(&self, target_ops: &HookOps<P>) {
        let _enum_guard = self.ns_enum_lock.lock();
        let mut globals = self.global_hooks.lock();
        let Some(pos) = globals.iter().position(|g| std::ptr::eq(
            Arc::as_ptr(&g.ops.callback) as *const (),
            Arc::as_ptr(&target_ops.callback) as *const (),
        )) else {
            return;
        };
        let global = globals.remove(pos);
        drop(globals);

        let namespaces = self.namespaces.read();
        let tokens = global.tokens.into_inner();
        for (ns_id, token) in tokens {
            if let Some(ns) = namespaces.get(&ns_id) {
                self.unregister_net_hook(ns, &global.ops, token);
            }
        }
    }

    /// `register_hooks`: register each of `ops` globally, in order; on
    /// partial failure, roll back all previously successful global
    /// registrations in reverse order (the global analogue of
    /// `register_net_hooks`).
    pub fn register_hooks(&self, ops: Vec<HookOps<P>>) -> Result<(), RegisterError> {
        let mut registered: Vec<HookOps<P>> = Vec::with_capacity(ops.len());
        for op in ops {
            match self.register_hook(op.clone()) {
                Ok(()) => registered.push(op),
                Err(e) => {
                    for rolled in registered.into_iter().rev() {
                        self.unregister_hook(&rolled);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// `unregister_hooks`: unregister each global hook in reverse order.
    pub fn unregister_hooks(&self, ops: Vec<HookOps<P>>) {
        for op in ops.into_iter().rev() {
            self.unregister_hook(&op);
        }
    }
}

/// `Family`/`HookPoint` only need to be enumerated by index when tearing a
/// namespace down, so the `enum_iterator::all()` scan is cached once behind
/// a lazily-initialized static rather than re-walked on every lookup.
static FAMILIES: Lazy<Vec<Family>> = Lazy::new(|| enum_iterator::all::<Family>().collect());
static HOOK_POINTS: Lazy<Vec<HookPoint>> = Lazy::new(|| enum_iterator::all::<HookPoint>().collect());

fn family_index_to_family(idx: usize) -> Family {
    FAMILIES[idx]
}

fn hook_index_to_hookpoint(idx: usize) -> HookPoint {
    HOOK_POINTS[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::queue::NullQueue;
    use crate::device::Device;
    use crate::hook::HookState;
    use crate::verdict::Verdict;

    fn ops(priority: i32) -> HookOps<u8> {
        HookOps {
            family: Family::Ipv4,
            hooknum: HookPoint::PreRouting,
            priority,
            callback: Arc::new(|_: &_, _: &mut u8, _: &HookState<'_, u8>| Verdict::Accept),
            private: Arc::new(()),
            device: None,
        }
    }

    fn missing_device_ingress_ops() -> HookOps<u8> {
        HookOps {
            family: Family::Netdev,
            hooknum: HookPoint::Ingress,
            priority: 0,
            callback: Arc::new(|_: &_, _: &mut u8, _: &HookState<'_, u8>| Verdict::Accept),
            private: Arc::new(()),
            device: Some("ghost0".to_string()),
        }
    }

    #[test]
    fn register_net_hooks_rolls_back_in_reverse_order_on_partial_failure() {
        let registry: Registry<u8> = Registry::new(Arc::new(NullQueue));
        let ns = registry.create_namespace();

        let result = registry.register_net_hooks(&ns, vec![ops(0), missing_device_ingress_ops()]);

        assert_eq!(result, Err(RegisterError::NoSuchTarget));
        let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);
        assert_eq!(chain.len(), 0, "the first hook must be rolled back");
    }

    #[test]
    fn register_hook_then_unregister_hook_round_trips_across_namespaces() {
        let registry: Registry<u8> = Registry::new(Arc::new(NullQueue));
        let ns_a = registry.create_namespace();
        let ns_b = registry.create_namespace();

        let global_ops = ops(0);
        registry.register_hook(global_ops.clone()).unwrap();
        assert_eq!(ns_a.chain_at(Family::Ipv4, HookPoint::PreRouting).len(), 1);
        assert_eq!(ns_b.chain_at(Family::Ipv4, HookPoint::PreRouting).len(), 1);

        registry.unregister_hook(&global_ops);
        assert_eq!(ns_a.chain_at(Family::Ipv4, HookPoint::PreRouting).len(), 0);
        assert_eq!(ns_b.chain_at(Family::Ipv4, HookPoint::PreRouting).len(), 0);

        let ns_c = registry.create_namespace();
        assert_eq!(ns_c.chain_at(Family::Ipv4, HookPoint::PreRouting).len(), 0);
    }

    #[test]
    fn destroy_namespace_drains_the_table_and_every_device_ingress_chain() {
        let registry: Registry<u8> = Registry::new(Arc::new(NullQueue));
        let ns = registry.create_namespace();

        registry.register_net_hook(&ns, ops(0)).unwrap();
        registry.register_net_hook(&ns, ops(10)).unwrap();

        let device = Arc::new(Device::new("eth0"));
        ns.add_device(device.clone());
        registry
            .register_net_hook(
                &ns,
                HookOps {
                    family: Family::Netdev,
                    hooknum: HookPoint::Ingress,
                    priority: 0,
                    callback: Arc::new(|_: &_, _: &mut u8, _: &HookState<'_, u8>| Verdict::Accept),
                    private: Arc::new(()),
                    device: Some("eth0".to_string()),
                },
            )
            .unwrap();

        let table_chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);
        assert_eq!(table_chain.len(), 2);
        assert_eq!(device.ingress_chain().len(), 1);

        registry.destroy_namespace(&ns);

        assert_eq!(table_chain.len(), 0);
        assert_eq!(device.ingress_chain().len(), 0);
    }

    #[test]
    fn destroy_namespace_drains_safely_while_a_reader_is_traversing() {
        tokio_test::block_on(async {
            let registry: Arc<Registry<u8>> = Arc::new(Registry::new(Arc::new(NullQueue)));
            let ns = registry.create_namespace();
            registry.register_net_hook(&ns, ops(0)).unwrap();
            let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);

            let reader_chain = chain.clone();
            let reader = tokio::task::spawn_blocking(move || {
                for _ in 0..500 {
                    let snapshot = reader_chain.load();
                    assert!(snapshot.len() <= 1);
                }
            });

            registry.destroy_namespace(&ns);
            reader.await.expect("reader task panicked");

            assert_eq!(chain.len(), 0);
        });
    }
}
