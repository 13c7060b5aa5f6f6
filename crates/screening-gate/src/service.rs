//! Worker pool for screening many citations concurrently.
//!
//! Each submission runs on its own task. A semaphore bounds how many
//! citations are in flight; nothing else is shared between them apart from
//! the Event Log and result store behind the pipeline.

use std::sync::Arc;
use std::time::Duration;

use screening_types::{Citation, CitationId, DispositionBucket, IncompleteReason, PipelineResult};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ScreeningConfig;
use crate::error::GateError;
use crate::pipeline::ScreeningPipeline;
use crate::stats::StatsSnapshot;

/// Results of [`ScreeningService::run_batch`], in submission order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<PipelineResult>,
    pub stats: StatsSnapshot,
}

impl BatchReport {
    pub fn count(&self, bucket: DispositionBucket) -> usize {
        self.results.iter().filter(|r| r.bucket() == bucket).count()
    }
}

/// Handle to one submitted citation.
pub struct SubmissionHandle {
    citation_id: CitationId,
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<PipelineResult, GateError>>,
}

impl SubmissionHandle {
    pub fn citation_id(&self) -> CitationId {
        self.citation_id
    }

    /// Request cancellation. The citation ends `Incomplete` unless its
    /// stages have already finished.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the committed result.
    pub async fn outcome(self) -> Result<PipelineResult, GateError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(GateError::Worker(e.to_string())),
        }
    }
}

/// Submission interface over a shared [`ScreeningPipeline`].
#[derive(Clone)]
pub struct ScreeningService {
    pipeline: Arc<ScreeningPipeline>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl ScreeningService {
    pub fn new(pipeline: Arc<ScreeningPipeline>, config: &ScreeningConfig) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(config.worker_concurrency)),
            timeout: config.citation_timeout(),
        }
    }

    pub fn pipeline(&self) -> &Arc<ScreeningPipeline> {
        &self.pipeline
    }

    /// Start screening `citation` in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, citation: Citation) -> SubmissionHandle {
        let citation_id = citation.id();
        let (cancel, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(screen(
            self.pipeline.clone(),
            self.permits.clone(),
            self.timeout,
            citation,
            cancel_rx,
        ));
        debug!(citation_id = %citation_id, "Citation submitted");

        SubmissionHandle {
            citation_id,
            cancel,
            task,
        }
    }

    /// Screen every citation and wait for all of them.
    ///
    /// Per-citation failures are dispositions in the report. The first
    /// infrastructure failure cancels the remaining submissions and is
    /// returned.
    pub async fn run_batch(&self, citations: Vec<Citation>) -> Result<BatchReport, GateError> {
        let total = citations.len();
        let handles: Vec<SubmissionHandle> =
            citations.into_iter().map(|c| self.submit(c)).collect();

        let mut results = Vec::with_capacity(total);
        let mut pending = handles.into_iter();
        while let Some(handle) = pending.next() {
            match handle.outcome().await {
                Ok(result) => results.push(result),
                Err(e) => {
                    for rest in pending.by_ref() {
                        rest.cancel();
                    }
                    return Err(e);
                }
            }
        }

        let stats = self.pipeline.stats().snapshot();
        info!(
            citations = total,
            included = stats.included,
            discarded = stats.discarded,
            manual_review = stats.manual_review,
            errored = stats.errored,
            incomplete = stats.incomplete,
            "Batch screened"
        );

        Ok(BatchReport { results, stats })
    }
}

async fn screen(
    pipeline: Arc<ScreeningPipeline>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
    citation: Citation,
    mut cancel: watch::Receiver<bool>,
) -> Result<PipelineResult, GateError> {
    let citation_id = citation.id();

    let _permit = tokio::select! {
        biased;
        _ = cancelled(&mut cancel) => {
            return pipeline.abandon(citation_id, IncompleteReason::Cancelled).await;
        }
        permit = permits.acquire_owned() => {
            permit.map_err(|e| GateError::Worker(e.to_string()))?
        }
    };

    let interrupt = async move {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => IncompleteReason::Cancelled,
            _ = deadline(timeout) => IncompleteReason::TimedOut,
        }
    };
    pipeline.run_until(citation, interrupt).await
}

/// Sleeps for `timeout`; never resolves without one.
async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}

/// Resolves once cancellation is requested; never resolves if the handle is dropped.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
