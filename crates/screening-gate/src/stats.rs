use std::sync::atomic::{AtomicU64, Ordering};

use screening_types::{DispositionBucket, GatePhase};
use serde::{Deserialize, Serialize};

use crate::gate::GateOutcome;

#[derive(Default)]
struct GateCounters {
    resolved: AtomicU64,
    exhausted: AtomicU64,
    disagreements: AtomicU64,
    correction_cycles: AtomicU64,
}

impl GateCounters {
    fn record(&self, outcome: &GateOutcome) {
        if outcome.is_resolved() {
            self.resolved.fetch_add(1, Ordering::Relaxed);
        } else {
            self.exhausted.fetch_add(1, Ordering::Relaxed);
        }
        self.disagreements
            .fetch_add(u64::from(outcome.disagreements()), Ordering::Relaxed);
        self.correction_cycles
            .fetch_add(u64::from(outcome.cycles()), Ordering::Relaxed);
    }

    fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            resolved: self.resolved.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            disagreements: self.disagreements.load(Ordering::Relaxed),
            correction_cycles: self.correction_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Running counters shared by every in-flight citation.
#[derive(Default)]
pub struct ScreeningStats {
    processed: AtomicU64,
    triage: GateCounters,
    screening: GateCounters,
    buckets: [AtomicU64; 5],
}

impl ScreeningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_gate(&self, phase: GatePhase, outcome: &GateOutcome) {
        match phase {
            GatePhase::Triage => self.triage.record(outcome),
            GatePhase::Screening => self.screening.record(outcome),
        }
    }

    /// Count one committed citation.
    pub fn record_disposition(&self, bucket: DispositionBucket) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.buckets[bucket_index(bucket)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let count = |bucket| self.buckets[bucket_index(bucket)].load(Ordering::Relaxed);
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            triage: self.triage.snapshot(),
            screening: self.screening.snapshot(),
            included: count(DispositionBucket::Include),
            discarded: count(DispositionBucket::Discard),
            manual_review: count(DispositionBucket::CycleExhausted),
            errored: count(DispositionBucket::Errored),
            incomplete: count(DispositionBucket::Incomplete),
        }
    }
}

fn bucket_index(bucket: DispositionBucket) -> usize {
    match bucket {
        DispositionBucket::Include => 0,
        DispositionBucket::Discard => 1,
        DispositionBucket::CycleExhausted => 2,
        DispositionBucket::Errored => 3,
        DispositionBucket::Incomplete => 4,
    }
}

/// Per-gate counters at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub resolved: u64,
    pub exhausted: u64,
    /// Verdicts with `agree = false`.
    pub disagreements: u64,
    pub correction_cycles: u64,
}

/// Point-in-time copy of [`ScreeningStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub triage: GateSnapshot,
    pub screening: GateSnapshot,
    pub included: u64,
    pub discarded: u64,
    pub manual_review: u64,
    pub errored: u64,
    pub incomplete: u64,
}

impl StatsSnapshot {
    pub fn bucket(&self, bucket: DispositionBucket) -> u64 {
        match bucket {
            DispositionBucket::Include => self.included,
            DispositionBucket::Discard => self.discarded,
            DispositionBucket::CycleExhausted => self.manual_review,
            DispositionBucket::Errored => self.errored,
            DispositionBucket::Incomplete => self.incomplete,
        }
    }
}
