use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{CitationId, RecordId};
use crate::record::DecisionRecord;
use crate::state::{PipelineState, TransitionError};

/// Immutable source metadata of a citation.
///
/// Opaque to the orchestration layer; only stages interpret it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationMetadata {
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    /// Any further bibliographic fields (authors, journal, year, ...).
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl CitationMetadata {
    pub fn new(title: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            abstract_text: abstract_text.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A citation moving through the screening pipeline.
///
/// The decision list is append-only: records are pushed, never replaced.
/// The state only moves along the transitions allowed by [`PipelineState`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Citation {
    id: CitationId,
    metadata: CitationMetadata,
    state: PipelineState,
    decisions: Vec<DecisionRecord>,
}

impl Citation {
    pub fn new(metadata: CitationMetadata) -> Self {
        Self::with_id(CitationId::new(), metadata)
    }

    /// Create a citation with an id assigned at ingestion.
    pub fn with_id(id: CitationId, metadata: CitationMetadata) -> Self {
        Self {
            id,
            metadata,
            state: PipelineState::Start,
            decisions: Vec::new(),
        }
    }

    pub fn id(&self) -> CitationId {
        self.id
    }

    pub fn metadata(&self) -> &CitationMetadata {
        &self.metadata
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Every DecisionRecord produced for this citation, oldest first.
    pub fn decisions(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    pub fn latest_decision(&self) -> Option<&DecisionRecord> {
        self.decisions.last()
    }

    pub fn latest_decision_id(&self) -> Option<RecordId> {
        self.decisions.last().map(|r| r.id)
    }

    /// Append a decision record.
    pub fn record_decision(&mut self, record: DecisionRecord) {
        self.decisions.push(record);
    }

    /// Move to the next pipeline state.
    pub fn advance(&mut self, next: PipelineState) -> Result<(), TransitionError> {
        self.state = self.state.clone().transition(next)?;
        Ok(())
    }
}
