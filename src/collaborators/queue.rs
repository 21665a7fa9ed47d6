//! The userspace queue collaborator (`nf_queue` in the source).

use std::sync::{Arc, Mutex};

use crate::error::QueueError;
use crate::hook::{HookEntry, HookState, HookToken};

/// Delivers a `QUEUE`-verdicted packet to whatever sits downstream
/// (typically a userspace-facing channel). Must accept ownership of the
/// packet on success; must not block the calling hot-path thread.
pub trait QueueCollaborator<P>: Send + Sync {
    fn queue(&self, entry: &HookEntry<P>, state: &HookState<'_, P>, qid: u16) -> Result<(), QueueError>;

    /// Invoked by the registry after the first quiescence of a
    /// deregistration, to ask the collaborator to drop any packets parked
    /// against `token` before the registry frees the entry.
    fn drop_parked(&self, _token: HookToken) {}
}

/// A collaborator with no listener bound to any queue id — every call
/// reports [`QueueError::NoListener`]. Used where a chain never actually
/// queues, and in tests exercising the bypass path.
pub struct NullQueue;

impl<P> QueueCollaborator<P> for NullQueue {
    fn queue(&self, _entry: &HookEntry<P>, _state: &HookState<'_, P>, _qid: u16) -> Result<(), QueueError> {
        Err(QueueError::NoListener)
    }
}

/// A collaborator that records every `qid` it was asked to queue. Used by
/// integration tests to exercise the engine's successful-queue path, which
/// `NullQueue` can never reach.
#[derive(Default, Clone)]
pub struct RecordingQueue {
    pub seen: Arc<Mutex<Vec<u16>>>,
}

impl<P> QueueCollaborator<P> for RecordingQueue {
    fn queue(&self, _entry: &HookEntry<P>, _state: &HookState<'_, P>, qid: u16) -> Result<(), QueueError> {
        self.seen.lock().unwrap().push(qid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{Family, HookPoint};

    #[test]
    fn null_queue_always_reports_no_listener() {
        let q = NullQueue;
        let entries: Vec<HookEntry<u8>> = Vec::new();
        let _ = &entries;
        let state = HookState {
            hook: HookPoint::PreRouting,
            pf: Family::Ipv4,
            thresh: 0,
            in_device: None,
            out_device: None,
            sock: None,
            okfn: Box::new(|_: &mut u8| {}),
        };
        // Build a throwaway entry just to exercise the call shape.
        let entry = crate::hook::HookEntry::new(
            crate::hook::HookOps {
                family: Family::Ipv4,
                hooknum: HookPoint::PreRouting,
                priority: 0,
                callback: Arc::new(|_: &_, _: &mut u8, _: &HookState<'_, u8>| crate::verdict::Verdict::Accept),
                private: Arc::new(()),
                device: None,
            },
            0,
        );
        assert_eq!(q.queue(&entry, &state, 1), Err(QueueError::NoListener));
    }
}
