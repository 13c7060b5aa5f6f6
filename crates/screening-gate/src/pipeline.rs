//! Pipeline Orchestrator.
//!
//! Sequences Classifier, gate 1, Detailed Screening and gate 2 for one
//! citation and hands the terminal disposition to the [`DecisionSink`].

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use screening_ledger::{EventLog, LedgerError, ResultStore};
use screening_types::{
    Citation, CitationId, Disposition, GatePhase, IncompleteReason, PipelineResult,
    PipelineState, StageKind, TriageTier,
};
use tracing::{debug, info, warn};

use crate::config::{LikelyIrrelevantPolicy, ScreeningConfig};
use crate::error::{GateError, StageError};
use crate::gate::{GateController, GateOutcome};
use crate::sink::DecisionSink;
use crate::stats::ScreeningStats;
use crate::traits::{DecisionStage, ReviewStage, StageInput};

/// Reviewer and Improver bound to one gate.
#[derive(Clone)]
pub struct GateBinding {
    pub reviewer: Arc<dyn ReviewStage>,
    pub improver: Arc<dyn DecisionStage>,
}

/// Stage implementations for the four roles.
#[derive(Clone)]
pub struct StageRegistry {
    pub classifier: Arc<dyn DecisionStage>,
    pub screener: Arc<dyn DecisionStage>,
    pub triage_gate: GateBinding,
    pub screening_gate: GateBinding,
}

impl StageRegistry {
    /// One Reviewer/Improver pair serving both gates.
    pub fn new(
        classifier: Arc<dyn DecisionStage>,
        screener: Arc<dyn DecisionStage>,
        reviewer: Arc<dyn ReviewStage>,
        improver: Arc<dyn DecisionStage>,
    ) -> Self {
        let binding = GateBinding { reviewer, improver };
        Self {
            classifier,
            screener,
            triage_gate: binding.clone(),
            screening_gate: binding,
        }
    }

    /// Bind a dedicated pair to the screening gate.
    pub fn with_screening_gate(
        mut self,
        reviewer: Arc<dyn ReviewStage>,
        improver: Arc<dyn DecisionStage>,
    ) -> Self {
        self.screening_gate = GateBinding { reviewer, improver };
        self
    }
}

/// Where a citation goes once gate 1 has resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriageRoute {
    DetailedScreening,
    Discard,
}

/// Route a resolved triage record.
///
/// `include = false` always discards. A likely-irrelevant tier is discarded
/// unless the policy lets the Reviewer's include flag forward it.
pub fn route_after_triage(
    policy: LikelyIrrelevantPolicy,
    tier: TriageTier,
    include: bool,
) -> TriageRoute {
    if !include {
        return TriageRoute::Discard;
    }
    match (tier, policy) {
        (TriageTier::LikelyIrrelevant, LikelyIrrelevantPolicy::Discard) => TriageRoute::Discard,
        _ => TriageRoute::DetailedScreening,
    }
}

/// Runs citations through both gates.
pub struct ScreeningPipeline {
    classifier: Arc<dyn DecisionStage>,
    screener: Arc<dyn DecisionStage>,
    triage_gate: GateController,
    screening_gate: GateController,
    policy: LikelyIrrelevantPolicy,
    log: Arc<dyn EventLog>,
    sink: DecisionSink,
    stats: Arc<ScreeningStats>,
    /// Citations currently being screened or committed.
    in_flight: DashMap<CitationId, ()>,
}

/// Exclusive hold on one citation; released on drop.
struct Claim<'a> {
    in_flight: &'a DashMap<CitationId, ()>,
    citation_id: CitationId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.citation_id);
    }
}

impl ScreeningPipeline {
    pub fn new(
        config: &ScreeningConfig,
        stages: StageRegistry,
        log: Arc<dyn EventLog>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        let triage_gate = GateController::new(
            GatePhase::Triage,
            stages.triage_gate.reviewer,
            stages.triage_gate.improver,
            config.max_correction_cycles,
            log.clone(),
        );
        let screening_gate = GateController::new(
            GatePhase::Screening,
            stages.screening_gate.reviewer,
            stages.screening_gate.improver,
            config.max_correction_cycles,
            log.clone(),
        );

        Self {
            classifier: stages.classifier,
            screener: stages.screener,
            triage_gate,
            screening_gate,
            policy: config.likely_irrelevant_policy,
            sink: DecisionSink::new(log.clone(), store),
            log,
            stats: Arc::new(ScreeningStats::new()),
            in_flight: DashMap::new(),
        }
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    pub fn sink(&self) -> &DecisionSink {
        &self.sink
    }

    pub fn stats(&self) -> &Arc<ScreeningStats> {
        &self.stats
    }

    /// Screen one citation to its terminal disposition.
    ///
    /// Stage failures end the citation in the errored bucket and still
    /// return `Ok`. Only store failures, illegal transitions and repeated
    /// or concurrent submission of the same citation are returned as `Err`.
    pub async fn run(&self, citation: Citation) -> Result<PipelineResult, GateError> {
        self.run_until(citation, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops the stages as soon as `interrupt`
    /// resolves and commits `Incomplete` with the reason it yields.
    ///
    /// `interrupt` only races the stage invocations. Once a disposition is
    /// decided the commit runs to completion.
    pub async fn run_until<I>(
        &self,
        mut citation: Citation,
        interrupt: I,
    ) -> Result<PipelineResult, GateError>
    where
        I: Future<Output = IncompleteReason>,
    {
        let citation_id = citation.id();
        let _claim = self.claim(citation_id)?;
        if self.sink.result(citation_id).await?.is_some() {
            return Err(LedgerError::DuplicateResult(citation_id).into());
        }

        info!(
            citation_id = %citation_id,
            title = %citation.metadata().title,
            "Screening citation"
        );

        let driven = tokio::select! {
            biased;
            reason = interrupt => Err(reason),
            driven = self.drive(&mut citation) => Ok(driven),
        };

        let disposition = match driven {
            Ok(Ok(disposition)) => disposition,
            Ok(Err(GateError::StageFailure(e))) => {
                warn!(citation_id = %citation_id, error = %e, "Stage failure");
                Disposition::Errored {
                    stage: Some(e.stage()),
                    message: e.to_string(),
                }
            }
            Ok(Err(e)) => return Err(e),
            Err(reason) => self.interrupted(citation_id, reason).await?,
        };

        self.commit(&mut citation, disposition).await
    }

    /// Commit an `Incomplete` disposition for a citation that never got
    /// to run, or whose run was lost.
    ///
    /// The partial history stays in the Event Log; `resume_from` names the
    /// last DecisionRecord it holds. Fails with `InFlight` while a run of
    /// the same citation is active.
    pub async fn abandon(
        &self,
        citation_id: CitationId,
        reason: IncompleteReason,
    ) -> Result<PipelineResult, GateError> {
        let _claim = self.claim(citation_id)?;
        let disposition = self.interrupted(citation_id, reason).await?;
        let result = self.sink.commit(citation_id, disposition).await?;
        self.stats.record_disposition(result.bucket());
        Ok(result)
    }

    fn claim(&self, citation_id: CitationId) -> Result<Claim<'_>, GateError> {
        match self.in_flight.entry(citation_id) {
            Entry::Occupied(_) => Err(GateError::InFlight(citation_id)),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(Claim {
                    in_flight: &self.in_flight,
                    citation_id,
                })
            }
        }
    }

    async fn interrupted(
        &self,
        citation_id: CitationId,
        reason: IncompleteReason,
    ) -> Result<Disposition, GateError> {
        let resume_from = self
            .log
            .latest_decision(citation_id, None)
            .await?
            .map(|record| record.id);
        debug!(
            citation_id = %citation_id,
            reason = ?reason,
            resume_from = ?resume_from,
            "Run interrupted"
        );
        Ok(Disposition::Incomplete { reason, resume_from })
    }

    async fn drive(&self, citation: &mut Citation) -> Result<Disposition, GateError> {
        let triage = self.classifier.decide(StageInput::fresh(citation)).await?;
        citation.advance(PipelineState::Triaged)?;

        let outcome = self.triage_gate.resolve(citation, triage).await?;
        self.stats.record_gate(GatePhase::Triage, &outcome);
        let (record, verdict) = match outcome {
            GateOutcome::Resolved { record, verdict, .. } => (record, verdict),
            GateOutcome::CycleExhausted { cycles, .. } => {
                return Ok(Disposition::CycleExhausted {
                    phase: GatePhase::Triage,
                    cycles,
                })
            }
        };
        citation.advance(PipelineState::Gate1Resolved)?;

        let tier = record.label.triage_tier().ok_or_else(|| {
            StageError::malformed(StageKind::Classifier, "resolved record has no triage tier")
        })?;
        let route = route_after_triage(self.policy, tier, verdict.include);
        debug!(
            citation_id = %citation.id(),
            tier = %tier,
            include = verdict.include,
            route = ?route,
            "Triage routed"
        );
        if route == TriageRoute::Discard {
            return Ok(Disposition::Discard);
        }

        let screening = self
            .screener
            .decide(StageInput::with_context(citation, &record))
            .await?;
        citation.advance(PipelineState::Screened)?;

        let outcome = self.screening_gate.resolve(citation, screening).await?;
        self.stats.record_gate(GatePhase::Screening, &outcome);
        let verdict = match outcome {
            GateOutcome::Resolved { verdict, .. } => verdict,
            GateOutcome::CycleExhausted { cycles, .. } => {
                return Ok(Disposition::CycleExhausted {
                    phase: GatePhase::Screening,
                    cycles,
                })
            }
        };
        citation.advance(PipelineState::Gate2Resolved)?;

        Ok(if verdict.include {
            Disposition::Include
        } else {
            Disposition::Discard
        })
    }

    async fn commit(
        &self,
        citation: &mut Citation,
        disposition: Disposition,
    ) -> Result<PipelineResult, GateError> {
        citation.advance(PipelineState::Terminal(disposition.bucket()))?;
        let result = self.sink.commit(citation.id(), disposition).await?;
        self.stats.record_disposition(result.bucket());
        Ok(result)
    }
}
