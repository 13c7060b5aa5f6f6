use std::sync::Arc;

use chrono::Utc;
use screening_ledger::{EventLog, LedgerError, ResultStore};
use screening_types::{CitationId, Disposition, DispositionBucket, LogEvent, PipelineResult};
use tracing::{info, warn};

use crate::error::GateError;

/// Decision Sink: persists one PipelineResult per citation.
///
/// Appends the terminal disposition to the Event Log first, so the stored
/// history always ends with it. A citation whose history already ends in a
/// disposition is treated as committed even if the store write never landed.
/// `CycleExhausted` results land in their own manual-review bucket.
#[derive(Clone)]
pub struct DecisionSink {
    log: Arc<dyn EventLog>,
    store: Arc<dyn ResultStore>,
}

impl DecisionSink {
    pub fn new(log: Arc<dyn EventLog>, store: Arc<dyn ResultStore>) -> Self {
        Self { log, store }
    }

    /// Commit the terminal disposition of `citation_id`.
    pub async fn commit(
        &self,
        citation_id: CitationId,
        disposition: Disposition,
    ) -> Result<PipelineResult, GateError> {
        if self.store.get(citation_id).await?.is_some() {
            return Err(LedgerError::DuplicateResult(citation_id).into());
        }
        if self.disposition_logged(citation_id).await? {
            warn!(citation_id = %citation_id, "Disposition logged without a stored result");
            return Err(LedgerError::DuplicateResult(citation_id).into());
        }

        self.log
            .append(citation_id, LogEvent::Disposition(disposition.clone()))
            .await?;
        let history = self.log.history(citation_id).await?;

        let result = PipelineResult {
            citation_id,
            disposition,
            history,
            committed_at: Utc::now(),
        };
        self.store.put(result.clone()).await?;

        match &result.disposition {
            Disposition::Include | Disposition::Discard => info!(
                citation_id = %citation_id,
                bucket = ?result.bucket(),
                entries = result.history.len(),
                "Citation disposed"
            ),
            Disposition::CycleExhausted { phase, cycles } => warn!(
                citation_id = %citation_id,
                gate = %phase,
                cycles,
                "Citation routed to manual review"
            ),
            Disposition::Errored { stage, message } => warn!(
                citation_id = %citation_id,
                stage = ?stage,
                error = %message,
                "Citation errored"
            ),
            Disposition::Incomplete { reason, resume_from } => warn!(
                citation_id = %citation_id,
                reason = ?reason,
                resume_from = ?resume_from,
                "Citation incomplete"
            ),
        }

        Ok(result)
    }

    async fn disposition_logged(&self, citation_id: CitationId) -> Result<bool, GateError> {
        match self.log.history(citation_id).await {
            Ok(history) => Ok(history
                .last()
                .is_some_and(|entry| entry.as_disposition().is_some())),
            Err(LedgerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn result(&self, citation_id: CitationId) -> Result<Option<PipelineResult>, GateError> {
        Ok(self.store.get(citation_id).await?)
    }

    pub async fn bucket(&self, bucket: DispositionBucket) -> Result<Vec<PipelineResult>, GateError> {
        Ok(self.store.list(Some(bucket)).await?)
    }

    pub async fn all(&self) -> Result<Vec<PipelineResult>, GateError> {
        Ok(self.store.list(None).await?)
    }

    pub async fn included(&self) -> Result<Vec<PipelineResult>, GateError> {
        self.bucket(DispositionBucket::Include).await
    }

    pub async fn discarded(&self) -> Result<Vec<PipelineResult>, GateError> {
        self.bucket(DispositionBucket::Discard).await
    }

    /// Citations whose correction loop did not converge.
    pub async fn manual_review(&self) -> Result<Vec<PipelineResult>, GateError> {
        self.bucket(DispositionBucket::CycleExhausted).await
    }

    pub async fn errored(&self) -> Result<Vec<PipelineResult>, GateError> {
        self.bucket(DispositionBucket::Errored).await
    }

    pub async fn incomplete(&self) -> Result<Vec<PipelineResult>, GateError> {
        self.bucket(DispositionBucket::Incomplete).await
    }

    /// Committed results as JSON Lines, one `PipelineResult` per line.
    pub async fn export_jsonl(
        &self,
        bucket: Option<DispositionBucket>,
    ) -> Result<String, GateError> {
        let mut out = String::new();
        for result in self.store.list(bucket).await? {
            out.push_str(&serde_json::to_string(&result)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_ledger::{InMemoryEventLog, InMemoryResultStore};
    use screening_types::GatePhase;

    fn sink() -> (DecisionSink, Arc<InMemoryEventLog>) {
        let log = Arc::new(InMemoryEventLog::new());
        let store = Arc::new(InMemoryResultStore::new());
        (DecisionSink::new(log.clone(), store), log)
    }

    #[tokio::test]
    async fn history_ends_with_disposition() {
        let (sink, _log) = sink();
        let id = CitationId::new();

        let result = sink.commit(id, Disposition::Discard).await.unwrap();

        assert_eq!(result.history.len(), 1);
        assert_eq!(
            result.history.last().and_then(|e| e.as_disposition()),
            Some(&Disposition::Discard)
        );
    }

    #[tokio::test]
    async fn second_commit_is_rejected_without_logging() {
        let (sink, log) = sink();
        let id = CitationId::new();
        sink.commit(id, Disposition::Include).await.unwrap();

        let err = sink.commit(id, Disposition::Discard).await.unwrap_err();

        assert!(matches!(err, GateError::Ledger(LedgerError::DuplicateResult(c)) if c == id));
        assert_eq!(log.history(id).await.unwrap().len(), 1);
        assert_eq!(
            sink.result(id).await.unwrap().unwrap().disposition,
            Disposition::Include
        );
    }

    #[tokio::test]
    async fn logged_disposition_blocks_second_commit() {
        let (sink, log) = sink();
        let id = CitationId::new();
        log.append(id, LogEvent::Disposition(Disposition::Discard))
            .await
            .unwrap();

        let err = sink
            .commit(
                id,
                Disposition::Incomplete {
                    reason: screening_types::IncompleteReason::Cancelled,
                    resume_from: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Ledger(LedgerError::DuplicateResult(c)) if c == id));
        assert_eq!(log.history(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_citations_have_their_own_bucket() {
        let (sink, _log) = sink();
        let exhausted = CitationId::new();
        sink.commit(
            exhausted,
            Disposition::CycleExhausted {
                phase: GatePhase::Screening,
                cycles: 2,
            },
        )
        .await
        .unwrap();
        sink.commit(CitationId::new(), Disposition::Discard).await.unwrap();

        let manual = sink.manual_review().await.unwrap();
        assert_eq!(manual.len(), 1);
        assert_eq!(manual[0].citation_id, exhausted);
        assert_eq!(sink.discarded().await.unwrap().len(), 1);
        assert!(sink.included().await.unwrap().is_empty());
        assert_eq!(sink.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn export_writes_one_line_per_result() {
        let (sink, _log) = sink();
        let id = CitationId::new();
        sink.commit(id, Disposition::Include).await.unwrap();
        sink.commit(CitationId::new(), Disposition::Discard).await.unwrap();

        let all = sink.export_jsonl(None).await.unwrap();
        assert_eq!(all.lines().count(), 2);

        let included = sink.export_jsonl(Some(DispositionBucket::Include)).await.unwrap();
        let parsed: PipelineResult = serde_json::from_str(included.trim_end()).unwrap();
        assert_eq!(parsed.citation_id, id);
        assert_eq!(parsed.disposition, Disposition::Include);
    }
}
