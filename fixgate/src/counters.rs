//! Process-wide message counters (§6's "metrics counters" collaborator).
//! The real archive/indexer subsystem that consumes these is out of
//! scope; what lives here is just the explicitly-passed observable
//! handle itself (§9 Design Notes).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct FixCounters {
    messages_in: AtomicU64,
    messages_out: AtomicU64,
    gaps_detected: AtomicU64,
    rejects: AtomicU64,
    disconnects: AtomicU64,
}

impl FixCounters {
    pub fn new() -> FixCounters {
        FixCounters::default()
    }

    pub fn record_message_in(&self) {
        self.messages_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_out(&self) {
        self.messages_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gap_detected(&self) {
        self.gaps_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reject(&self) {
        self.rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FixCountersSnapshot {
        FixCountersSnapshot {
            messages_in: self.messages_in.load(Ordering::Relaxed),
            messages_out: self.messages_out.load(Ordering::Relaxed),
            gaps_detected: self.gaps_detected.load(Ordering::Relaxed),
            rejects: self.rejects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FixCountersSnapshot {
    pub messages_in: u64,
    pub messages_out: u64,
    pub gaps_detected: u64,
    pub rejects: u64,
    pub disconnects: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let counters = FixCounters::new();
        counters.record_message_in();
        counters.record_message_in();
        counters.record_gap_detected();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.messages_in, 2);
        assert_eq!(snapshot.gaps_detected, 1);
        assert_eq!(snapshot.messages_out, 0);
    }
}
