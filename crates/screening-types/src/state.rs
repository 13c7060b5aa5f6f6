use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::disposition::DispositionBucket;

/// Per-citation orchestration state.
///
/// `Terminal` states are absorbing: no transition leaves them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "bucket", rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    /// Classifier has produced the triage record.
    Triaged,
    /// Gate 1 converged with an agreeing verdict.
    Gate1Resolved,
    /// Detailed Screening has produced its record.
    Screened,
    /// Gate 2 converged with an agreeing verdict.
    Gate2Resolved,
    Terminal(DispositionBucket),
}

/// Rejected state transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid pipeline transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: PipelineState,
    pub to: PipelineState,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Terminal(_))
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use DispositionBucket as B;
        use PipelineState as S;

        // Errors and cancellation may interrupt any live state.
        if !self.is_terminal() && matches!(next, S::Terminal(B::Errored | B::Incomplete)) {
            return true;
        }

        matches!(
            (self, next),
            (S::Start, S::Triaged)
                | (S::Triaged, S::Gate1Resolved)
                | (S::Triaged, S::Terminal(B::CycleExhausted))
                | (S::Gate1Resolved, S::Screened)
                | (S::Gate1Resolved, S::Terminal(B::Discard))
                | (S::Screened, S::Gate2Resolved)
                | (S::Screened, S::Terminal(B::CycleExhausted))
                | (S::Gate2Resolved, S::Terminal(B::Include | B::Discard))
        )
    }

    /// Consume the state and return `next` if the transition is legal.
    pub fn transition(self, next: PipelineState) -> Result<PipelineState, TransitionError> {
        if self.can_transition_to(&next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}
