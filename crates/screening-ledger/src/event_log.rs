use async_trait::async_trait;
use screening_types::{
    CitationId, DecisionRecord, GatePhase, LogEntry, LogEvent, RecordId, ReviewVerdict, StageKind,
};

use crate::LedgerResult;

/// Filter for querying a citation's history.
#[derive(Clone, Debug, Default)]
pub struct HistoryFilter {
    pub stage: Option<StageKind>,
    pub phase: Option<GatePhase>,
    /// Only entries with a sequence strictly greater than this.
    pub after_sequence: Option<u64>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: StageKind) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_phase(mut self, phase: GatePhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn after_sequence(mut self, sequence: u64) -> Self {
        self.after_sequence = Some(sequence);
        self
    }

    /// Check if a log entry matches this filter.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(after) = self.after_sequence {
            if entry.sequence <= after {
                return false;
            }
        }

        if let Some(stage) = self.stage {
            if entry.event.stage() != Some(stage) {
                return false;
            }
        }

        if let Some(phase) = self.phase {
            let entry_phase = match &entry.event {
                LogEvent::Decision(record) => Some(record.phase),
                LogEvent::Review(verdict) => Some(verdict.phase),
                LogEvent::Disposition(_) => None,
            };
            if entry_phase != Some(phase) {
                return false;
            }
        }

        true
    }
}

/// Event Log: append-only audit trail of every stage invocation.
///
/// Implementations MUST:
/// - assign sequence numbers starting at 1, strictly increasing per citation;
/// - never overwrite or delete an entry;
/// - accept concurrent appends for different citations without a global lock.
///
/// The pipeline writes; reporting and audit tooling only read.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append an event and return the stored entry with its sequence number.
    async fn append(&self, citation_id: CitationId, event: LogEvent) -> LedgerResult<LogEntry>;

    /// Full ordered history of a citation.
    async fn history(&self, citation_id: CitationId) -> LedgerResult<Vec<LogEntry>>;

    /// Ids of every citation with at least one entry.
    async fn citations(&self) -> LedgerResult<Vec<CitationId>>;

    /// History entries matching `filter`, in sequence order.
    async fn query(
        &self,
        citation_id: CitationId,
        filter: &HistoryFilter,
    ) -> LedgerResult<Vec<LogEntry>> {
        let history = self.history(citation_id).await?;
        Ok(history.into_iter().filter(|e| filter.matches(e)).collect())
    }

    /// Most recent DecisionRecord, optionally restricted to one stage kind.
    async fn latest_decision(
        &self,
        citation_id: CitationId,
        stage: Option<StageKind>,
    ) -> LedgerResult<Option<DecisionRecord>> {
        let history = match self.history(citation_id).await {
            Ok(history) => history,
            Err(crate::LedgerError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(history
            .iter()
            .rev()
            .filter_map(LogEntry::as_decision)
            .find(|record| stage.map_or(true, |s| record.stage == s))
            .cloned())
    }

    /// Every verdict that reviewed `record_id`, oldest first.
    async fn verdicts_for(
        &self,
        citation_id: CitationId,
        record_id: RecordId,
    ) -> LedgerResult<Vec<ReviewVerdict>> {
        let history = self.history(citation_id).await?;
        Ok(history
            .iter()
            .filter_map(LogEntry::as_review)
            .filter(|verdict| verdict.reviews == record_id)
            .cloned()
            .collect())
    }
}
