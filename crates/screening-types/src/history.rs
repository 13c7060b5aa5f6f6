use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::disposition::Disposition;
use crate::ids::CitationId;
use crate::label::StageKind;
use crate::record::{DecisionRecord, ReviewVerdict};

/// Something that happened to a citation, as recorded in the Event Log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEvent {
    Decision(DecisionRecord),
    Review(ReviewVerdict),
    /// Written once by the Decision Sink when the citation leaves the pipeline.
    Disposition(Disposition),
}

impl LogEvent {
    /// The stage that produced this event, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            LogEvent::Decision(record) => Some(record.stage),
            LogEvent::Review(_) => Some(StageKind::Reviewer),
            LogEvent::Disposition(_) => None,
        }
    }
}

/// A single Event Log entry keyed by `(citation_id, sequence)`.
///
/// Sequence numbers start at 1 and are strictly increasing per citation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub citation_id: CitationId,
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: LogEvent,
}

impl LogEntry {
    pub fn as_decision(&self) -> Option<&DecisionRecord> {
        match &self.event {
            LogEvent::Decision(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_review(&self) -> Option<&ReviewVerdict> {
        match &self.event {
            LogEvent::Review(verdict) => Some(verdict),
            _ => None,
        }
    }

    pub fn as_disposition(&self) -> Option<&Disposition> {
        match &self.event {
            LogEvent::Disposition(disposition) => Some(disposition),
            _ => None,
        }
    }
}
