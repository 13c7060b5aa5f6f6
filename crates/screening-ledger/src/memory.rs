//! In-memory event log and result store.
//!
//! Entries are sharded per citation in a `DashMap`, so the only lock taken
//! on append is the shard holding that citation. Suitable for tests and
//! single-process runs; durable backends implement the same traits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use screening_types::{CitationId, DispositionBucket, LogEntry, LogEvent, PipelineResult};

use crate::error::LedgerError;
use crate::event_log::EventLog;
use crate::result_store::ResultStore;
use crate::LedgerResult;

/// In-memory event log implementation.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    /// Per-citation histories, each ordered by sequence.
    entries: Arc<DashMap<CitationId, Vec<LogEntry>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all citations.
    pub fn total_count(&self) -> usize {
        self.entries.iter().map(|h| h.value().len()).sum()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, citation_id: CitationId, event: LogEvent) -> LedgerResult<LogEntry> {
        // The entry guard is the per-citation append lock: sequence allocation
        // and push happen under it, and it is released before returning.
        let mut history = self.entries.entry(citation_id).or_default();
        let sequence = history.last().map_or(1, |last| last.sequence + 1);
        let entry = LogEntry {
            citation_id,
            sequence,
            recorded_at: Utc::now(),
            event,
        };
        history.push(entry.clone());
        Ok(entry)
    }

    async fn history(&self, citation_id: CitationId) -> LedgerResult<Vec<LogEntry>> {
        self.entries
            .get(&citation_id)
            .map(|history| history.value().clone())
            .ok_or(LedgerError::NotFound(citation_id))
    }

    async fn citations(&self) -> LedgerResult<Vec<CitationId>> {
        let mut ids: Vec<CitationId> = self.entries.iter().map(|h| *h.key()).collect();
        ids.sort();
        Ok(ids)
    }
}

/// In-memory result store implementation.
#[derive(Clone, Default)]
pub struct InMemoryResultStore {
    results: Arc<DashMap<CitationId, PipelineResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, result: PipelineResult) -> LedgerResult<()> {
        match self.results.entry(result.citation_id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateResult(result.citation_id)),
            Entry::Vacant(slot) => {
                slot.insert(result);
                Ok(())
            }
        }
    }

    async fn get(&self, citation_id: CitationId) -> LedgerResult<Option<PipelineResult>> {
        Ok(self.results.get(&citation_id).map(|r| r.value().clone()))
    }

    async fn list(&self, bucket: Option<DispositionBucket>) -> LedgerResult<Vec<PipelineResult>> {
        let mut results: Vec<PipelineResult> = self
            .results
            .iter()
            .filter(|r| bucket.map_or(true, |b| r.value().bucket() == b))
            .map(|r| r.value().clone())
            .collect();
        results.sort_by_key(|r| r.committed_at);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::HistoryFilter;
    use proptest::prelude::*;
    use screening_types::{
        DecisionRecord, Disposition, GatePhase, Label, ReviewVerdict, StageKind, TriageTier,
    };

    fn triage_record(tier: TriageTier) -> DecisionRecord {
        DecisionRecord::new(
            StageKind::Classifier,
            GatePhase::Triage,
            Label::Triage(tier),
            "classifier rationale",
        )
    }

    fn result_for(citation_id: CitationId, disposition: Disposition) -> PipelineResult {
        PipelineResult {
            citation_id,
            disposition,
            history: vec![],
            committed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequences() {
        let log = InMemoryEventLog::new();
        let cid = CitationId::new();
        let record = triage_record(TriageTier::Uncertain);
        let verdict = ReviewVerdict::new(&record, true, true, "ok");

        let first = log.append(cid, LogEvent::Decision(record)).await.unwrap();
        let second = log.append(cid, LogEvent::Review(verdict)).await.unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(log.total_count(), 2);
    }

    #[tokio::test]
    async fn sequences_are_independent_per_citation() {
        let log = InMemoryEventLog::new();
        let a = CitationId::new();
        let b = CitationId::new();

        log.append(a, LogEvent::Decision(triage_record(TriageTier::Uncertain)))
            .await
            .unwrap();
        let b_first = log
            .append(b, LogEvent::Decision(triage_record(TriageTier::Uncertain)))
            .await
            .unwrap();

        assert_eq!(b_first.sequence, 1);
        assert_eq!(log.citations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_citation_history_is_not_found() {
        let log = InMemoryEventLog::new();
        let cid = CitationId::new();
        assert_eq!(log.history(cid).await, Err(LedgerError::NotFound(cid)));
        assert!(log.latest_decision(cid, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_reads_are_idempotent() {
        let log = InMemoryEventLog::new();
        let cid = CitationId::new();
        log.append(cid, LogEvent::Decision(triage_record(TriageTier::Uncertain)))
            .await
            .unwrap();

        let first = log.history(cid).await.unwrap();
        let second = log.history(cid).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn latest_decision_by_stage() {
        let log = InMemoryEventLog::new();
        let cid = CitationId::new();
        let original = triage_record(TriageTier::Uncertain);
        let amended = DecisionRecord::revision(
            &original,
            Label::Triage(TriageTier::PotentiallyRelevant),
            "improved",
        );
        log.append(cid, LogEvent::Decision(original.clone()))
            .await
            .unwrap();
        log.append(cid, LogEvent::Decision(amended.clone()))
            .await
            .unwrap();

        let latest = log.latest_decision(cid, None).await.unwrap().unwrap();
        assert_eq!(latest.id, amended.id);

        let latest_classifier = log
            .latest_decision(cid, Some(StageKind::Classifier))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest_classifier.id, original.id);
    }

    #[tokio::test]
    async fn query_and_verdict_lookup() {
        let log = InMemoryEventLog::new();
        let cid = CitationId::new();
        let record = triage_record(TriageTier::LikelyIrrelevant);
        let verdict = ReviewVerdict::new(&record, false, false, "disagree");
        log.append(cid, LogEvent::Decision(record.clone()))
            .await
            .unwrap();
        log.append(cid, LogEvent::Review(verdict.clone()))
            .await
            .unwrap();

        let reviews = log
            .query(cid, &HistoryFilter::new().with_stage(StageKind::Reviewer))
            .await
            .unwrap();
        assert_eq!(reviews.len(), 1);

        let later = log
            .query(cid, &HistoryFilter::new().after_sequence(1))
            .await
            .unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].sequence, 2);

        let screening = log
            .query(cid, &HistoryFilter::new().with_phase(GatePhase::Screening))
            .await
            .unwrap();
        assert!(screening.is_empty());

        let verdicts = log.verdicts_for(cid, record.id).await.unwrap();
        assert_eq!(verdicts, vec![verdict]);
    }

    #[tokio::test]
    async fn concurrent_appends_lose_nothing() {
        let log = InMemoryEventLog::new();
        let citations: Vec<CitationId> = (0..8).map(|_| CitationId::new()).collect();

        let mut handles = Vec::new();
        for cid in citations.clone() {
            for _ in 0..25 {
                let log = log.clone();
                handles.push(tokio::spawn(async move {
                    log.append(cid, LogEvent::Decision(triage_record(TriageTier::Uncertain)))
                        .await
                        .unwrap();
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for cid in citations {
            let history = log.history(cid).await.unwrap();
            let sequences: Vec<u64> = history.iter().map(|e| e.sequence).collect();
            assert_eq!(sequences, (1..=25).collect::<Vec<u64>>());
        }
    }

    #[tokio::test]
    async fn result_store_rejects_second_commit() {
        let store = InMemoryResultStore::new();
        let cid = CitationId::new();

        store.put(result_for(cid, Disposition::Include)).await.unwrap();
        let err = store
            .put(result_for(cid, Disposition::Discard))
            .await
            .unwrap_err();

        assert_eq!(err, LedgerError::DuplicateResult(cid));
        let kept = store.get(cid).await.unwrap().unwrap();
        assert_eq!(kept.disposition, Disposition::Include);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn result_store_lists_by_bucket() {
        let store = InMemoryResultStore::new();
        store
            .put(result_for(CitationId::new(), Disposition::Include))
            .await
            .unwrap();
        store
            .put(result_for(CitationId::new(), Disposition::Discard))
            .await
            .unwrap();
        store
            .put(result_for(
                CitationId::new(),
                Disposition::CycleExhausted {
                    phase: GatePhase::Triage,
                    cycles: 2,
                },
            ))
            .await
            .unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 3);
        assert_eq!(
            store
                .list(Some(DispositionBucket::CycleExhausted))
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .list(Some(DispositionBucket::Errored))
            .await
            .unwrap()
            .is_empty());
    }

    proptest! {
        #[test]
        fn property_history_is_append_only(kinds in proptest::collection::vec(any::<bool>(), 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            rt.block_on(async move {
                let log = InMemoryEventLog::new();
                let cid = CitationId::new();
                let mut previous: Vec<LogEntry> = Vec::new();

                for is_decision in kinds {
                    let record = triage_record(TriageTier::Uncertain);
                    let event = if is_decision {
                        LogEvent::Decision(record)
                    } else {
                        LogEvent::Review(ReviewVerdict::new(&record, false, true, "prop"))
                    };
                    log.append(cid, event).await.expect("append");

                    let current = log.history(cid).await.expect("history");
                    // Every earlier entry is still present, unchanged, at the same position.
                    assert_eq!(&current[..previous.len()], &previous[..]);
                    assert_eq!(current.len(), previous.len() + 1);
                    assert_eq!(current.last().map(|e| e.sequence), Some(current.len() as u64));
                    previous = current;
                }
            });
        }
    }
}
