//! The verdict engine: the hot-path chain traversal.

use log::{debug, trace};

use crate::collaborators::queue::QueueCollaborator;
use crate::error::{resolve_drop_errno, QueueError};
use crate::hook::{HookEntry, HookState};
use crate::verdict::Verdict;

/// Outcome of [`hook_slow`], matching the source's return contract:
/// `1` -> `Proceed` (caller must run `state.okfn`), `-errno` -> `Drop`,
/// `0` -> `Consumed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOutcome {
    Proceed,
    Drop(i32),
    Consumed,
}

impl EngineOutcome {
    /// The engine's C-ABI return contract: `1`, `-errno`, or `0`.
    pub fn as_i32(self) -> i32 {
        match self {
            EngineOutcome::Proceed => 1,
            EngineOutcome::Drop(errno) => -errno,
            EngineOutcome::Consumed => 0,
        }
    }
}

/// Iterate `entries` starting at `from`, applying the threshold filter and
/// invoking callbacks. Returns the terminal verdict and the index of the
/// entry that produced it (needed by the caller to invoke the queue
/// collaborator with the right entry).
///
/// Mirrors the source's `nf_iterate`: `REPEAT` re-invokes the same entry
/// without advancing, any verdict other than `ACCEPT`/`REPEAT` stops the
/// scan immediately.
fn iterate<P>(
    entries: &[HookEntry<P>],
    from: usize,
    packet: &mut P,
    state: &HookState<'_, P>,
) -> (Verdict, usize) {
    let mut i = from;
    while i < entries.len() {
        let entry = &entries[i];
        if entry.priority() < state.thresh {
            i += 1;
            continue;
        }
        loop {
            let verdict = entry.invoke(packet, state);
            match verdict {
                Verdict::Accept => break,
                Verdict::Repeat => continue,
                other => return (other, i),
            }
        }
        i += 1;
    }
    (Verdict::Accept, entries.len())
}

/// The hot-path traversal: iterate the chain named by `state.hook_list`
/// from its head, dispatch on each entry's verdict, and deliver queued
/// packets to the queue collaborator.
///
/// Wait-free except for callback code: acquires the chain snapshot once
/// (the publication protocol, see [`crate::chain::Chain::load`]) and never
/// blocks, allocates on the hot path, or sleeps.
pub fn hook_slow<P>(
    entries: &[HookEntry<P>],
    packet: &mut P,
    state: &HookState<'_, P>,
    queue: &dyn QueueCollaborator<P>,
) -> EngineOutcome {
    let mut from = 0;
    loop {
        let (verdict, idx) = iterate(entries, from, packet, state);
        match verdict {
            Verdict::Accept | Verdict::Stop => {
                return EngineOutcome::Proceed;
            }
            Verdict::Drop(errno) => {
                let errno = resolve_drop_errno(errno);
                trace!("packet dropped by hook at priority {} (errno {errno})", entry_priority(entries, idx));
                return EngineOutcome::Drop(errno);
            }
            Verdict::Stolen => {
                trace!("packet stolen by hook at priority {}", entry_priority(entries, idx));
                return EngineOutcome::Consumed;
            }
            Verdict::Queue { qid, bypass } => {
                let entry = &entries[idx];
                match queue.queue(entry, state, qid) {
                    Ok(()) => return EngineOutcome::Consumed,
                    Err(QueueError::NoListener) if bypass => {
                        debug!("queue {qid} has no listener, bypassing to next hook");
                        from = idx + 1;
                        continue;
                    }
                    Err(_) => return EngineOutcome::Consumed,
                }
            }
            Verdict::Repeat => unreachable!("iterate() never returns Repeat"),
        }
    }
}

fn entry_priority<P>(entries: &[HookEntry<P>], idx: usize) -> i32 {
    entries.get(idx).map(|e| e.priority()).unwrap_or_default()
}

/// `hook_slow` exposed through the source's literal C ABI return contract
/// (`1` / `-errno` / `0`), for callers at the external-interface boundary
/// that expect that encoding directly instead of [`EngineOutcome`].
pub fn hook_slow_word<P>(
    entries: &[HookEntry<P>],
    packet: &mut P,
    state: &HookState<'_, P>,
    queue: &dyn QueueCollaborator<P>,
) -> i32 {
    hook_slow(entries, packet, state, queue).as_i32()
}
