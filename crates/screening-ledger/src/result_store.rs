use async_trait::async_trait;
use screening_types::{CitationId, DispositionBucket, PipelineResult};

use crate::LedgerResult;

/// Storage for committed pipeline results.
///
/// Exactly one result per citation: `put` MUST reject a second result for a
/// citation that already has one.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist a result. Fails with `DuplicateResult` if one already exists.
    async fn put(&self, result: PipelineResult) -> LedgerResult<()>;

    /// Get the committed result for a citation.
    async fn get(&self, citation_id: CitationId) -> LedgerResult<Option<PipelineResult>>;

    /// List results, optionally restricted to a single bucket.
    async fn list(&self, bucket: Option<DispositionBucket>) -> LedgerResult<Vec<PipelineResult>>;
}
