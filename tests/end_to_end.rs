//! End-to-end scenarios exercising the registry, chain and engine together,
//! one per illustrative scenario: priority order, registration symmetry,
//! drop-path exactness, queue bypass, concurrent deregistration safety, and
//! cross-namespace global-hook replay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nf_hooks::collaborators::queue::NullQueue;
use nf_hooks::engine::{hook_slow, EngineOutcome};
use nf_hooks::family::{Family, HookPoint};
use nf_hooks::hook::{HookOps, HookState};
use nf_hooks::registry::Registry;
use nf_hooks::verdict::Verdict;

fn state() -> HookState<'static, u32> {
    HookState {
        hook: HookPoint::PreRouting,
        pf: Family::Ipv4,
        thresh: i32::MIN,
        in_device: None,
        out_device: None,
        sock: None,
        okfn: Box::new(|_| {}),
    }
}

fn ops_with<F>(priority: i32, cb: F) -> HookOps<u32>
where
    F: Fn(&(dyn std::any::Any + Send + Sync), &mut u32, &HookState<'_, u32>) -> Verdict
        + Send
        + Sync
        + 'static,
{
    HookOps {
        family: Family::Ipv4,
        hooknum: HookPoint::PreRouting,
        priority,
        callback: Arc::new(cb),
        private: Arc::new(()),
        device: None,
    }
}

#[test]
fn hooks_run_in_non_decreasing_priority_order() {
    let registry: Registry<u32> = Registry::new(Arc::new(NullQueue));
    let ns = registry.create_namespace();
    let order = Arc::new(Mutex::new(Vec::new()));

    for priority in [50, -50, 0] {
        let order = order.clone();
        registry
            .register_net_hook(
                &ns,
                ops_with(priority, move |_, _, _| {
                    order.lock().unwrap().push(priority);
                    Verdict::Accept
                }),
            )
            .unwrap();
    }

    let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);
    let snapshot = chain.load();
    let mut packet = 0u32;
    let outcome = hook_slow(&snapshot, &mut packet, &state(), &NullQueue);

    assert_eq!(outcome, EngineOutcome::Proceed);
    assert_eq!(*order.lock().unwrap(), vec![-50, 0, 50]);
}

#[test]
fn register_then_unregister_restores_the_chain() {
    let registry: Registry<u32> = Registry::new(Arc::new(NullQueue));
    let ns = registry.create_namespace();
    let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);

    let ops_a = ops_with(0, |_, _, _| Verdict::Accept);
    let token_a = registry.register_net_hook(&ns, ops_a.clone()).unwrap();
    assert_eq!(chain.len(), 1);

    let ops_b = ops_with(10, |_, _, _| Verdict::Accept);
    let token_b = registry.register_net_hook(&ns, ops_b.clone()).unwrap();
    assert_eq!(chain.len(), 2);

    registry.unregister_net_hook(&ns, &ops_b, token_b);
    assert_eq!(chain.len(), 1);

    registry.unregister_net_hook(&ns, &ops_a, token_a);
    assert_eq!(chain.len(), 0);
}

#[test]
fn drop_verdict_stops_the_chain_and_reports_its_errno() {
    let registry: Registry<u32> = Registry::new(Arc::new(NullQueue));
    let ns = registry.create_namespace();
    let later_ran = Arc::new(AtomicUsize::new(0));
    let later_ran2 = later_ran.clone();

    registry
        .register_net_hook(&ns, ops_with(-10, |_, _, _| Verdict::Accept))
        .unwrap();
    registry
        .register_net_hook(&ns, ops_with(0, |_, _, _| Verdict::Drop(13)))
        .unwrap();
    registry
        .register_net_hook(
            &ns,
            ops_with(10, move |_, _, _| {
                later_ran2.fetch_add(1, Ordering::SeqCst);
                Verdict::Accept
            }),
        )
        .unwrap();

    let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);
    let snapshot = chain.load();
    let mut packet = 0u32;
    let outcome = hook_slow(&snapshot, &mut packet, &state(), &NullQueue);

    assert_eq!(outcome, EngineOutcome::Drop(13));
    assert_eq!(outcome.as_i32(), -13);
    assert_eq!(later_ran.load(Ordering::SeqCst), 0);
}

#[test]
fn queue_without_a_listener_bypasses_to_the_next_hook() {
    let registry: Registry<u32> = Registry::new(Arc::new(NullQueue));
    let ns = registry.create_namespace();
    let second_ran = Arc::new(AtomicUsize::new(0));
    let second_ran2 = second_ran.clone();

    registry
        .register_net_hook(&ns, ops_with(0, |_, _, _| Verdict::queue(3, true)))
        .unwrap();
    registry
        .register_net_hook(
            &ns,
            ops_with(10, move |_, _, _| {
                second_ran2.fetch_add(1, Ordering::SeqCst);
                Verdict::Accept
            }),
        )
        .unwrap();

    let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);
    let snapshot = chain.load();
    let mut packet = 0u32;
    let outcome = hook_slow(&snapshot, &mut packet, &state(), &NullQueue);

    assert_eq!(outcome, EngineOutcome::Proceed);
    assert_eq!(second_ran.load(Ordering::SeqCst), 1);
}

#[test]
fn global_hook_replays_into_namespaces_created_after_registration() {
    let registry: Registry<u32> = Registry::new(Arc::new(NullQueue));
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = seen.clone();

    registry
        .register_hook(ops_with(0, move |_, _, _| {
            seen2.fetch_add(1, Ordering::SeqCst);
            Verdict::Accept
        }))
        .unwrap();

    let ns_before = registry.create_namespace();
    let ns_after = registry.create_namespace();

    for ns in [&ns_before, &ns_after] {
        let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);
        assert_eq!(chain.len(), 1);
        let snapshot = chain.load();
        let mut packet = 0u32;
        hook_slow(&snapshot, &mut packet, &state(), &NullQueue);
    }

    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_readers_observe_a_consistent_chain_during_deregistration() {
    let registry: Arc<Registry<u32>> = Arc::new(Registry::new(Arc::new(NullQueue)));
    let ns = registry.create_namespace();

    registry
        .register_net_hook(&ns, ops_with(-10, |_, _, _| Verdict::Accept))
        .unwrap();
    let probe_ops = ops_with(0, |_, _, _| Verdict::Accept);
    let probe_token = registry.register_net_hook(&ns, probe_ops.clone()).unwrap();
    registry
        .register_net_hook(&ns, ops_with(10, |_, _, _| Verdict::Accept))
        .unwrap();

    let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);

    let mut readers = Vec::new();
    for _ in 0..8 {
        let chain = chain.clone();
        readers.push(std::thread::spawn(move || {
            for _ in 0..2000 {
                let snapshot = chain.load();
                let mut packet = 0u32;
                let outcome = hook_slow(&snapshot, &mut packet, &state(), &NullQueue);
                assert_eq!(outcome, EngineOutcome::Proceed);
            }
        }));
    }

    registry.unregister_net_hook(&ns, &probe_ops, probe_token);

    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(chain.len(), 2);
}
