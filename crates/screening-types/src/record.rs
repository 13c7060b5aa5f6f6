use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RecordId, VerdictId};
use crate::label::{GatePhase, Label, StageKind};

/// The output of exactly one Classifier, Detailed Screening or Improver invocation.
///
/// Immutable once created. An amendment is a new record whose `revision_of`
/// points at the record it amends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: RecordId,
    pub stage: StageKind,
    pub phase: GatePhase,
    pub label: Label,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
    pub revision_of: Option<RecordId>,
}

impl DecisionRecord {
    /// A fresh (non-amending) record.
    pub fn new(
        stage: StageKind,
        phase: GatePhase,
        label: Label,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            stage,
            phase,
            label,
            rationale: rationale.into(),
            created_at: Utc::now(),
            revision_of: None,
        }
    }

    /// An Improver amendment of `prior`, staying within the prior record's gate.
    pub fn revision(prior: &DecisionRecord, label: Label, rationale: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            stage: StageKind::Improver,
            phase: prior.phase,
            label,
            rationale: rationale.into(),
            created_at: Utc::now(),
            revision_of: Some(prior.id),
        }
    }

    pub fn is_revision(&self) -> bool {
        self.revision_of.is_some()
    }
}

/// The Reviewer's audit of a single DecisionRecord.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub id: VerdictId,
    /// The record under review.
    pub reviews: RecordId,
    pub phase: GatePhase,
    /// Whether the Reviewer agrees with the record.
    pub agree: bool,
    /// Whether the Reviewer considers the citation eligible to go forward.
    pub include: bool,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

impl ReviewVerdict {
    pub fn new(
        record: &DecisionRecord,
        agree: bool,
        include: bool,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            id: VerdictId::new(),
            reviews: record.id,
            phase: record.phase,
            agree,
            include,
            rationale: rationale.into(),
            created_at: Utc::now(),
        }
    }
}
