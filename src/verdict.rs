//! Verdict representation.
//!
//! [`Verdict`] is the value a callback returns from inside a chain
//! traversal. [`VerdictWord`] is the dense bit-packed encoding used at the
//! FFI/demo boundary, matching the source's single machine word: a
//! low-byte kind (`MASK = 0xFF`) plus high bits carrying a queue number, a
//! bypass flag, or a drop errno.

use bitflags::bitflags;
use log::warn;

const MASK: u32 = 0xFF;
const KIND_ACCEPT: u32 = 0;
const KIND_DROP: u32 = 1;
const KIND_STOLEN: u32 = 2;
const KIND_QUEUE: u32 = 3;
const KIND_REPEAT: u32 = 4;
const KIND_STOP: u32 = 5;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QueueFlags: u32 {
        /// If the queue collaborator reports "no listener", resume
        /// traversal at the next entry instead of dropping the packet.
        const BYPASS = 0b1;
    }
}

/// A callback's instruction to the verdict engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// `errno == 0` means "use the default" (resolved by
    /// [`crate::error::resolve_drop_errno`]).
    Drop(i32),
    /// The callback took ownership of the packet.
    Stolen,
    Queue { qid: u16, bypass: bool },
    /// Re-invoke the same entry without advancing the cursor.
    Repeat,
    /// Terminal accept: stop traversal without visiting later entries.
    Stop,
}

impl Verdict {
    pub fn queue(qid: u16, bypass: bool) -> Self {
        Verdict::Queue { qid, bypass }
    }

    pub fn drop_with_errno(errno: i32) -> Self {
        Verdict::Drop(errno)
    }

    pub fn to_word(self) -> VerdictWord {
        let raw = match self {
            Verdict::Accept => KIND_ACCEPT,
            Verdict::Drop(errno) => KIND_DROP | ((errno as u32) << 8),
            Verdict::Stolen => KIND_STOLEN,
            Verdict::Queue { qid, bypass } => {
                let flags = if bypass { QueueFlags::BYPASS.bits() } else { 0 };
                KIND_QUEUE | ((qid as u32) << 16) | (flags << 8)
            }
            Verdict::Repeat => KIND_REPEAT,
            Verdict::Stop => KIND_STOP,
        };
        VerdictWord(raw)
    }
}

/// Dense bit-packed encoding of a [`Verdict`], used across the FFI/demo
/// boundary. An unknown kind decodes to `Verdict::Drop(0)` (the engine logs
/// this in debug builds before treating it as a drop, per spec §4.5d).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictWord(pub u32);

impl VerdictWord {
    pub fn kind(self) -> u32 {
        self.0 & MASK
    }

    pub fn queue_id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn bypass(self) -> bool {
        ((self.0 >> 8) & QueueFlags::BYPASS.bits()) != 0
    }

    pub fn drop_errno(self) -> i32 {
        (self.0 >> 8) as i32
    }

    pub fn to_verdict(self) -> Verdict {
        match self.kind() {
            KIND_ACCEPT => Verdict::Accept,
            KIND_DROP => Verdict::Drop(self.drop_errno()),
            KIND_STOLEN => Verdict::Stolen,
            KIND_QUEUE => Verdict::Queue {
                qid: self.queue_id(),
                bypass: self.bypass(),
            },
            KIND_REPEAT => Verdict::Repeat,
            KIND_STOP => Verdict::Stop,
            unknown => {
                #[cfg(debug_assertions)]
                warn!("evil verdict kind {unknown} observed on the data path, treating as DROP");
                #[cfg(not(debug_assertions))]
                let _ = unknown;
                Verdict::Drop(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_round_trips() {
        assert_eq!(Verdict::Accept.to_word().to_verdict(), Verdict::Accept);
    }

    #[test]
    fn drop_carries_errno() {
        let word = Verdict::Drop(13).to_word();
        assert_eq!(word.kind(), KIND_DROP);
        assert_eq!(word.drop_errno(), 13);
        assert_eq!(word.to_verdict(), Verdict::Drop(13));
    }

    #[test]
    fn queue_carries_id_and_bypass() {
        let word = Verdict::queue(7, true).to_word();
        assert_eq!(word.queue_id(), 7);
        assert!(word.bypass());
        assert_eq!(word.to_verdict(), Verdict::Queue { qid: 7, bypass: true });
    }

    #[test]
    fn unknown_kind_is_treated_as_drop() {
        let word = VerdictWord(0xAB);
        assert_eq!(word.to_verdict(), Verdict::Drop(0));
    }
}
