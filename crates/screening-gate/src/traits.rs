use async_trait::async_trait;
use screening_types::{Citation, DecisionRecord, ReviewVerdict};

use crate::error::StageError;

/// Input handed to a decision-producing stage.
#[derive(Clone, Copy, Debug)]
pub struct StageInput<'a> {
    pub citation: &'a Citation,
    /// For the Improver: the record to amend. For Detailed Screening: the
    /// resolved triage record, as context only.
    pub prior: Option<&'a DecisionRecord>,
    /// For the Improver: the disagreeing verdict that triggered the amendment.
    pub verdict: Option<&'a ReviewVerdict>,
}

impl<'a> StageInput<'a> {
    pub fn fresh(citation: &'a Citation) -> Self {
        Self {
            citation,
            prior: None,
            verdict: None,
        }
    }

    pub fn with_context(citation: &'a Citation, prior: &'a DecisionRecord) -> Self {
        Self {
            citation,
            prior: Some(prior),
            verdict: None,
        }
    }

    pub fn amend(
        citation: &'a Citation,
        prior: &'a DecisionRecord,
        verdict: &'a ReviewVerdict,
    ) -> Self {
        Self {
            citation,
            prior: Some(prior),
            verdict: Some(verdict),
        }
    }
}

/// A stage that produces a DecisionRecord: Classifier, Detailed Screening, Improver.
///
/// Implementations must be deterministic for identical inputs as far as the
/// pipeline is concerned; the pipeline never re-invokes a stage to smooth
/// over variance. Malformed output must be reported as `StageError`, never
/// replaced with a default label.
#[async_trait]
pub trait DecisionStage: Send + Sync {
    /// Human-readable stage name, used in logs.
    fn stage_name(&self) -> &str;

    async fn decide(&self, input: StageInput<'_>) -> Result<DecisionRecord, StageError>;
}

/// The Reviewer: audits one DecisionRecord.
#[async_trait]
pub trait ReviewStage: Send + Sync {
    fn stage_name(&self) -> &str;

    async fn review(
        &self,
        citation: &Citation,
        record: &DecisionRecord,
    ) -> Result<ReviewVerdict, StageError>;
}
