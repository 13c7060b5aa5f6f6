use std::num::NonZeroU32;
use std::sync::Arc;

use screening_ledger::EventLog;
use screening_types::{
    Citation, DecisionRecord, GatePhase, LogEvent, ReviewVerdict, StageKind,
};
use tracing::{debug, info, warn};

use crate::error::{GateError, StageError};
use crate::traits::{DecisionStage, ReviewStage, StageInput};

/// Resolved result of one gate for one citation.
#[derive(Clone, Debug)]
pub enum GateOutcome {
    /// The Reviewer agreed with `record`.
    Resolved {
        record: DecisionRecord,
        verdict: ReviewVerdict,
        cycles: u32,
    },
    /// The Reviewer still disagreed after `cycles` amendments.
    CycleExhausted {
        record: DecisionRecord,
        verdict: ReviewVerdict,
        cycles: u32,
    },
}

impl GateOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, GateOutcome::Resolved { .. })
    }

    /// Improver amendments performed.
    pub fn cycles(&self) -> u32 {
        match self {
            GateOutcome::Resolved { cycles, .. } | GateOutcome::CycleExhausted { cycles, .. } => {
                *cycles
            }
        }
    }

    /// Review rounds performed: every amendment is re-reviewed.
    pub fn review_rounds(&self) -> u32 {
        self.cycles() + 1
    }

    /// Verdicts with `agree = false`.
    pub fn disagreements(&self) -> u32 {
        match self {
            GateOutcome::Resolved { cycles, .. } => *cycles,
            GateOutcome::CycleExhausted { cycles, .. } => cycles + 1,
        }
    }
}

/// Gate Controller: mandatory review plus a bounded correction loop.
///
/// Used twice by the pipeline: after triage and after detailed screening.
/// A primary record never leaves the gate without an agreeing verdict; the
/// only other exit is `CycleExhausted` or a stage failure.
pub struct GateController {
    phase: GatePhase,
    reviewer: Arc<dyn ReviewStage>,
    improver: Arc<dyn DecisionStage>,
    max_correction_cycles: NonZeroU32,
    log: Arc<dyn EventLog>,
}

impl GateController {
    pub fn new(
        phase: GatePhase,
        reviewer: Arc<dyn ReviewStage>,
        improver: Arc<dyn DecisionStage>,
        max_correction_cycles: NonZeroU32,
        log: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            phase,
            reviewer,
            improver,
            max_correction_cycles,
            log,
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Drive `primary` through review and correction until resolved or exhausted.
    ///
    /// Appends the primary record, every verdict and every amendment to the
    /// event log and to the citation, in invocation order.
    pub async fn resolve(
        &self,
        citation: &mut Citation,
        primary: DecisionRecord,
    ) -> Result<GateOutcome, GateError> {
        self.validate_primary(&primary)?;
        self.append_decision(citation, primary.clone()).await?;

        let cap = self.max_correction_cycles.get();
        let mut current = primary;
        let mut cycles = 0u32;

        loop {
            debug!(
                citation_id = %citation.id(),
                gate = %self.phase,
                reviewer = self.reviewer.stage_name(),
                record_id = %current.id,
                "Reviewing decision"
            );

            let verdict = self.reviewer.review(citation, &current).await?;
            self.validate_verdict(&current, &verdict)?;
            self.log
                .append(citation.id(), LogEvent::Review(verdict.clone()))
                .await?;

            if verdict.agree {
                info!(
                    citation_id = %citation.id(),
                    gate = %self.phase,
                    label = %current.label,
                    include = verdict.include,
                    cycles,
                    "Gate resolved"
                );
                return Ok(GateOutcome::Resolved {
                    record: current,
                    verdict,
                    cycles,
                });
            }

            warn!(
                citation_id = %citation.id(),
                gate = %self.phase,
                label = %current.label,
                cycle = cycles,
                "Reviewer disagreed"
            );

            if cycles >= cap {
                warn!(
                    citation_id = %citation.id(),
                    gate = %self.phase,
                    cycles,
                    "Correction cycles exhausted"
                );
                return Ok(GateOutcome::CycleExhausted {
                    record: current,
                    verdict,
                    cycles,
                });
            }

            cycles += 1;
            let amended = self
                .improver
                .decide(StageInput::amend(citation, &current, &verdict))
                .await?;
            self.validate_amendment(&current, &amended)?;

            debug!(
                citation_id = %citation.id(),
                gate = %self.phase,
                improver = self.improver.stage_name(),
                from = %current.label,
                to = %amended.label,
                cycle = cycles,
                "Decision amended"
            );

            self.append_decision(citation, amended.clone()).await?;
            current = amended;
        }
    }

    async fn append_decision(
        &self,
        citation: &mut Citation,
        record: DecisionRecord,
    ) -> Result<(), GateError> {
        self.log
            .append(citation.id(), LogEvent::Decision(record.clone()))
            .await?;
        citation.record_decision(record);
        Ok(())
    }

    fn primary_stage(&self) -> StageKind {
        match self.phase {
            GatePhase::Triage => StageKind::Classifier,
            GatePhase::Screening => StageKind::DetailedScreener,
        }
    }

    fn validate_labels(&self, stage: StageKind, record: &DecisionRecord) -> Result<(), StageError> {
        if record.phase != self.phase || record.label.phase() != self.phase {
            return Err(StageError::malformed(
                stage,
                format!(
                    "label {} does not belong to the {} gate",
                    record.label, self.phase
                ),
            ));
        }
        Ok(())
    }

    fn validate_primary(&self, record: &DecisionRecord) -> Result<(), StageError> {
        let expected = self.primary_stage();
        if record.stage != expected {
            return Err(StageError::malformed(
                expected,
                format!("record produced by {} instead of {}", record.stage, expected),
            ));
        }
        if record.revision_of.is_some() {
            return Err(StageError::malformed(
                expected,
                "primary record must not amend another record",
            ));
        }
        self.validate_labels(expected, record)
    }

    fn validate_verdict(
        &self,
        record: &DecisionRecord,
        verdict: &ReviewVerdict,
    ) -> Result<(), StageError> {
        if verdict.reviews != record.id || verdict.phase != self.phase {
            return Err(StageError::malformed(
                StageKind::Reviewer,
                format!("verdict {} does not reference record {}", verdict.id, record.id),
            ));
        }
        Ok(())
    }

    fn validate_amendment(
        &self,
        prior: &DecisionRecord,
        amended: &DecisionRecord,
    ) -> Result<(), StageError> {
        if amended.stage != StageKind::Improver {
            return Err(StageError::malformed(
                StageKind::Improver,
                format!("amendment produced by {}", amended.stage),
            ));
        }
        if amended.revision_of != Some(prior.id) {
            return Err(StageError::malformed(
                StageKind::Improver,
                format!("amendment does not revise record {}", prior.id),
            ));
        }
        self.validate_labels(StageKind::Improver, amended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{AmendingImprover, ScriptedReviewer};
    use screening_ledger::InMemoryEventLog;
    use screening_types::{CitationMetadata, Label, ScreeningDecision, TriageTier};

    fn citation() -> Citation {
        Citation::new(CitationMetadata::new("Statins in older adults", "A cohort study."))
    }

    fn triage(tier: TriageTier) -> DecisionRecord {
        DecisionRecord::new(
            StageKind::Classifier,
            GatePhase::Triage,
            Label::Triage(tier),
            "classifier",
        )
    }

    fn gate(
        reviewer: Arc<ScriptedReviewer>,
        improver: Arc<AmendingImprover>,
        cap: u32,
        log: Arc<InMemoryEventLog>,
    ) -> GateController {
        GateController::new(
            GatePhase::Triage,
            reviewer,
            improver,
            NonZeroU32::new(cap).unwrap(),
            log,
        )
    }

    #[tokio::test]
    async fn resolves_immediately_on_agreement() {
        let log = Arc::new(InMemoryEventLog::new());
        let reviewer = Arc::new(ScriptedReviewer::always(true, true));
        let improver = Arc::new(AmendingImprover::keep_label());
        let gate = gate(reviewer.clone(), improver.clone(), 3, log.clone());
        let mut citation = citation();

        let outcome = gate
            .resolve(&mut citation, triage(TriageTier::PotentiallyRelevant))
            .await
            .unwrap();

        assert!(outcome.is_resolved());
        assert_eq!(outcome.review_rounds(), 1);
        assert_eq!(reviewer.calls(), 1);
        assert_eq!(improver.calls(), 0);
        assert_eq!(log.history(citation.id()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn converges_in_two_rounds_when_first_amendment_accepted() {
        let log = Arc::new(InMemoryEventLog::new());
        let reviewer = Arc::new(ScriptedReviewer::sequence(vec![(false, true), (true, true)]));
        let improver = Arc::new(AmendingImprover::to_label(Label::Triage(
            TriageTier::PotentiallyRelevant,
        )));
        let gate = gate(reviewer.clone(), improver.clone(), 5, log.clone());
        let mut citation = citation();
        let primary = triage(TriageTier::Uncertain);
        let primary_id = primary.id;

        let outcome = gate.resolve(&mut citation, primary).await.unwrap();

        assert_eq!(outcome.review_rounds(), 2);
        assert_eq!(outcome.disagreements(), 1);
        match outcome {
            GateOutcome::Resolved { record, .. } => {
                assert_eq!(record.revision_of, Some(primary_id));
                assert_eq!(record.label, Label::Triage(TriageTier::PotentiallyRelevant));
            }
            other => panic!("expected resolution, got {other:?}"),
        }
        // classify, review, amend, review
        assert_eq!(log.history(citation.id()).await.unwrap().len(), 4);
        assert_eq!(citation.decisions().len(), 2);
    }

    #[tokio::test]
    async fn exhausts_after_exactly_cap_cycles() {
        let log = Arc::new(InMemoryEventLog::new());
        let reviewer = Arc::new(ScriptedReviewer::always(false, true));
        let improver = Arc::new(AmendingImprover::keep_label());
        let gate = gate(reviewer.clone(), improver.clone(), 3, log.clone());
        let mut citation = citation();

        let outcome = gate
            .resolve(&mut citation, triage(TriageTier::Uncertain))
            .await
            .unwrap();

        assert!(matches!(outcome, GateOutcome::CycleExhausted { cycles: 3, .. }));
        assert_eq!(improver.calls(), 3);
        assert_eq!(reviewer.calls(), 4);
        assert_eq!(outcome.disagreements(), 4);
    }

    #[tokio::test]
    async fn verdict_for_wrong_record_is_stage_failure() {
        let log = Arc::new(InMemoryEventLog::new());
        let reviewer = Arc::new(ScriptedReviewer::always(true, true).reviewing_wrong_record());
        let improver = Arc::new(AmendingImprover::keep_label());
        let gate = gate(reviewer, improver, 1, log.clone());
        let mut citation = citation();

        let err = gate
            .resolve(&mut citation, triage(TriageTier::Uncertain))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GateError::StageFailure(StageError::Malformed {
                stage: StageKind::Reviewer,
                ..
            })
        ));
        // The primary record stays in the log; the malformed verdict does not.
        assert_eq!(log.history(citation.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn label_from_wrong_taxonomy_is_rejected() {
        let log = Arc::new(InMemoryEventLog::new());
        let gate = gate(
            Arc::new(ScriptedReviewer::always(true, true)),
            Arc::new(AmendingImprover::keep_label()),
            1,
            log.clone(),
        );
        let mut citation = citation();
        let wrong = DecisionRecord::new(
            StageKind::Classifier,
            GatePhase::Triage,
            Label::Screening(ScreeningDecision::Include),
            "confused classifier",
        );

        let err = gate.resolve(&mut citation, wrong).await.unwrap_err();
        assert!(matches!(err, GateError::StageFailure(_)));
        assert!(log.history(citation.id()).await.is_err());
    }

    #[tokio::test]
    async fn amendment_must_revise_current_record() {
        let log = Arc::new(InMemoryEventLog::new());
        let gate = gate(
            Arc::new(ScriptedReviewer::always(false, true)),
            Arc::new(AmendingImprover::keep_label().without_back_reference()),
            2,
            log,
        );
        let mut citation = citation();

        let err = gate
            .resolve(&mut citation, triage(TriageTier::Uncertain))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GateError::StageFailure(StageError::Malformed {
                stage: StageKind::Improver,
                ..
            })
        ));
    }
}
