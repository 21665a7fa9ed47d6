use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;

use nf_hooks::cli::Cli;
use nf_hooks::collaborators::queue::NullQueue;
use nf_hooks::engine::{hook_slow, EngineOutcome};
use nf_hooks::family::{Family, HookPoint};
use nf_hooks::hook::{HookOps, HookState};
use nf_hooks::logging;
use nf_hooks::registry::Registry;
use nf_hooks::verdict::Verdict;

#[cfg(feature = "diagnostics")]
use nf_hooks::diagnostics::{DropRecord, DropRing};

/// The toy packet type the demo pushes through the engine: just an
/// identifier and a payload length, enough to let callbacks observe and
/// mutate something.
#[derive(Debug, Clone)]
struct DemoPacket {
    id: u64,
    len: usize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logger("nf_hooks", cli.verbosity).expect("failed to init logger");

    let registry: Arc<Registry<DemoPacket>> = Arc::new(Registry::new(Arc::new(NullQueue)));
    let ns = registry.create_namespace();

    registry
        .register_net_hook(
            &ns,
            HookOps {
                family: Family::Ipv4,
                hooknum: HookPoint::PreRouting,
                priority: -100,
                callback: Arc::new(|_, packet: &mut DemoPacket, _| {
                    info!("pre_routing: packet {} ({} bytes)", packet.id, packet.len);
                    Verdict::Accept
                }),
                private: Arc::new(()),
                device: None,
            },
        )
        .expect("registration against a built-in hook point never fails");

    registry
        .register_net_hook(
            &ns,
            HookOps {
                family: Family::Ipv4,
                hooknum: HookPoint::PreRouting,
                priority: 0,
                callback: Arc::new(|_, packet: &mut DemoPacket, _| {
                    if packet.len > 1500 {
                        Verdict::Drop(90)
                    } else {
                        Verdict::Accept
                    }
                }),
                private: Arc::new(()),
                device: None,
            },
        )
        .expect("registration against a built-in hook point never fails");

    let chain = ns.chain_at(Family::Ipv4, HookPoint::PreRouting);

    #[cfg(feature = "diagnostics")]
    let drop_ring = Arc::new(DropRing::default());
    #[cfg(feature = "diagnostics")]
    let drain_task = {
        let drop_ring = drop_ring.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(50));
            for _ in 0..3 {
                interval.tick().await;
                drop_ring.drain_and_log();
            }
        })
    };

    let mut readers = Vec::new();
    for reader_id in 0..cli.readers {
        let chain = chain.clone();
        #[cfg(feature = "diagnostics")]
        let drop_ring = drop_ring.clone();
        readers.push(tokio::task::spawn_blocking(move || {
            for i in 0..200u64 {
                let snapshot = chain.load();
                let mut packet = DemoPacket {
                    id: reader_id as u64 * 1000 + i,
                    len: if i % 10 == 0 { 1600 } else { 64 },
                };
                let state = HookState {
                    hook: HookPoint::PreRouting,
                    pf: Family::Ipv4,
                    thresh: i32::MIN,
                    in_device: None,
                    out_device: None,
                    sock: None,
                    okfn: Box::new(|_| {}),
                };
                let outcome = hook_slow(&snapshot, &mut packet, &state, &NullQueue);
                debug_assert!(matches!(outcome, EngineOutcome::Proceed | EngineOutcome::Drop(_)));
                #[cfg(feature = "diagnostics")]
                if let EngineOutcome::Drop(errno) = outcome {
                    drop_ring.record(DropRecord {
                        at: chrono::Utc::now(),
                        hook: "pre_routing",
                        errno,
                        in_device: state.in_device.map(str::to_string),
                    });
                }
            }
        }));
    }

    for reader in readers {
        reader.await.expect("reader task panicked");
    }

    #[cfg(feature = "diagnostics")]
    {
        drop_ring.drain_and_log();
        drain_task.abort();
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    info!("demo run complete, {} entries remain in the chain", chain.len());
}
