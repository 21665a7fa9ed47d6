//! Optional per-worker drop-packet diagnostic ring, modeled on the source
//! netfilter core's `iptables_drop_packets` / `iptables_drop_packet_monitor`.
//! Each worker owns one [`DropRing`]; a record is pushed on every `DROP`
//! verdict, and a periodic task drains and logs a summary so the rings
//! never grow unbounded.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::info;
use parking_lot::Mutex;

/// One recorded drop, enough to reconstruct "what got dropped, where,
/// when" without holding onto the packet itself.
#[derive(Debug, Clone)]
pub struct DropRecord {
    pub at: DateTime<Utc>,
    pub hook: &'static str,
    pub errno: i32,
    pub in_device: Option<String>,
}

/// Fixed-capacity ring of the most recent drops on one worker. Oldest
/// entries are overwritten once `capacity` is reached, matching the
/// source's modular `drop_packets[IPTABLES_DROP_PACKET_NUM]` buffer.
pub struct DropRing {
    capacity: usize,
    records: Mutex<VecDeque<DropRecord>>,
}

impl DropRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, record: DropRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Drain every currently buffered record, logging a one-line summary
    /// per record (the source's `iptables_drop_packet_monitor`, minus the
    /// fixed-width `sbuff` formatting, which has no equivalent need here).
    pub fn drain_and_log(&self) {
        let mut records = self.records.lock();
        if records.is_empty() {
            return;
        }
        for record in records.drain(..) {
            info!(
                "dropped packet: hook={} errno={} in_device={:?} at={}",
                record.hook,
                record.errno,
                record.in_device,
                record.at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DropRing {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_overwrites_oldest_once_full() {
        let ring = DropRing::new(2);
        for i in 0..3 {
            ring.record(DropRecord {
                at: Utc::now(),
                hook: "pre_routing",
                errno: i,
                in_device: None,
            });
        }
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn drain_empties_the_ring() {
        let ring = DropRing::new(4);
        ring.record(DropRecord {
            at: Utc::now(),
            hook: "forward",
            errno: 13,
            in_device: Some("eth0".into()),
        });
        ring.drain_and_log();
        assert!(ring.is_empty());
    }
}
