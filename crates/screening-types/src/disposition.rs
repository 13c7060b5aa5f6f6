use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::LogEntry;
use crate::ids::{CitationId, RecordId};
use crate::label::{GatePhase, StageKind};
use crate::record::{DecisionRecord, ReviewVerdict};

/// Why a run ended without reaching a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    Cancelled,
    TimedOut,
}

/// Terminal outcome of one citation's run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Disposition {
    Include,
    Discard,
    /// The correction loop of `phase` did not converge within `cycles` amendments.
    CycleExhausted { phase: GatePhase, cycles: u32 },
    /// A stage produced malformed or missing output.
    Errored {
        stage: Option<StageKind>,
        message: String,
    },
    /// Cancelled or timed out; `resume_from` is the last committed DecisionRecord.
    Incomplete {
        reason: IncompleteReason,
        resume_from: Option<RecordId>,
    },
}

impl Disposition {
    pub fn bucket(&self) -> DispositionBucket {
        match self {
            Disposition::Include => DispositionBucket::Include,
            Disposition::Discard => DispositionBucket::Discard,
            Disposition::CycleExhausted { .. } => DispositionBucket::CycleExhausted,
            Disposition::Errored { .. } => DispositionBucket::Errored,
            Disposition::Incomplete { .. } => DispositionBucket::Incomplete,
        }
    }
}

/// The five mutually exclusive buckets every citation ends in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispositionBucket {
    Include,
    Discard,
    /// Routed to manual review.
    CycleExhausted,
    Errored,
    Incomplete,
}

impl DispositionBucket {
    pub const ALL: [DispositionBucket; 5] = [
        DispositionBucket::Include,
        DispositionBucket::Discard,
        DispositionBucket::CycleExhausted,
        DispositionBucket::Errored,
        DispositionBucket::Incomplete,
    ];
}

/// Terminal record committed once per citation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub citation_id: CitationId,
    pub disposition: Disposition,
    /// Full ordered Event Log history, ending with the disposition entry.
    pub history: Vec<LogEntry>,
    pub committed_at: DateTime<Utc>,
}

impl PipelineResult {
    pub fn bucket(&self) -> DispositionBucket {
        self.disposition.bucket()
    }

    pub fn decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.history.iter().filter_map(LogEntry::as_decision)
    }

    pub fn verdicts(&self) -> impl Iterator<Item = &ReviewVerdict> {
        self.history.iter().filter_map(LogEntry::as_review)
    }
}
