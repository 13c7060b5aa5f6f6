use screening_ledger::LedgerError;
use screening_types::{CitationId, StageKind, TransitionError};
use thiserror::Error;

/// A stage invocation that did not yield well-formed output.
///
/// Never defaulted: the citation ends in the errored bucket.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("stage {stage} produced malformed output: {reason}")]
    Malformed { stage: StageKind, reason: String },

    #[error("reasoning backend failed in stage {stage}: {reason}")]
    Backend { stage: StageKind, reason: String },
}

impl StageError {
    pub fn malformed(stage: StageKind, reason: impl Into<String>) -> Self {
        StageError::Malformed {
            stage,
            reason: reason.into(),
        }
    }

    /// The stage that failed.
    pub fn stage(&self) -> StageKind {
        match self {
            StageError::Malformed { stage, .. } | StageError::Backend { stage, .. } => *stage,
        }
    }
}

/// Errors from the screening pipeline.
///
/// `StageFailure` is recovered per citation; everything else is an
/// infrastructure failure surfaced to the caller.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("stage failure: {0}")]
    StageFailure(#[from] StageError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("citation {0} is already being screened")]
    InFlight(CitationId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("screening worker failed: {0}")]
    Worker(String),

    #[error("failed to export results: {0}")]
    Export(#[from] serde_json::Error),
}
