use std::num::NonZeroU32;
use std::sync::Arc;

use proptest::prelude::*;
use screening_gate::mocks::{AmendingImprover, FixedDecision, ScriptedReviewer};
use screening_gate::{
    GateController, GateOutcome, LikelyIrrelevantPolicy, ScreeningConfig, ScreeningPipeline,
    StageRegistry,
};
use screening_ledger::{EventLog, InMemoryEventLog, InMemoryResultStore};
use screening_types::{
    Citation, CitationMetadata, DecisionRecord, GatePhase, Label, LogEntry, ScreeningDecision,
    StageKind, TriageTier,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn tier_strategy() -> impl Strategy<Value = TriageTier> {
    prop_oneof![
        Just(TriageTier::PotentiallyRelevant),
        Just(TriageTier::Uncertain),
        Just(TriageTier::LikelyIrrelevant),
    ]
}

proptest! {
    #[test]
    fn cap_is_enforced_exactly(cap in 1u32..8) {
        runtime().block_on(async move {
            let log = Arc::new(InMemoryEventLog::new());
            let reviewer = Arc::new(ScriptedReviewer::always(false, true));
            let improver = Arc::new(AmendingImprover::keep_label());
            let gate = GateController::new(
                GatePhase::Screening,
                reviewer.clone(),
                improver.clone(),
                NonZeroU32::new(cap).unwrap(),
                log.clone(),
            );
            let mut citation = Citation::new(CitationMetadata::new("T", "A"));
            let primary = DecisionRecord::new(
                StageKind::DetailedScreener,
                GatePhase::Screening,
                Label::Screening(ScreeningDecision::Include),
                "screened",
            );

            let outcome = gate.resolve(&mut citation, primary).await.unwrap();

            assert!(matches!(outcome, GateOutcome::CycleExhausted { cycles, .. } if cycles == cap));
            assert_eq!(improver.calls(), cap as usize);
            assert_eq!(reviewer.calls(), cap as usize + 1);
            assert_eq!(citation.decisions().len(), cap as usize + 1);
            // primary + N amendments, each reviewed
            assert_eq!(
                log.history(citation.id()).await.unwrap().len(),
                2 * (cap as usize + 1)
            );
        });
    }

    #[test]
    fn first_accepted_amendment_resolves_in_two_rounds(cap in 1u32..8, include in any::<bool>()) {
        runtime().block_on(async move {
            let reviewer = Arc::new(ScriptedReviewer::sequence(vec![(false, true), (true, include)]));
            let improver = Arc::new(AmendingImprover::keep_label());
            let gate = GateController::new(
                GatePhase::Triage,
                reviewer.clone(),
                improver.clone(),
                NonZeroU32::new(cap).unwrap(),
                Arc::new(InMemoryEventLog::new()),
            );
            let mut citation = Citation::new(CitationMetadata::new("T", "A"));
            let primary = DecisionRecord::new(
                StageKind::Classifier,
                GatePhase::Triage,
                Label::Triage(TriageTier::Uncertain),
                "triaged",
            );

            let outcome = gate.resolve(&mut citation, primary).await.unwrap();

            assert!(outcome.is_resolved());
            assert_eq!(outcome.review_rounds(), 2);
            assert_eq!(reviewer.calls(), 2);
            assert_eq!(improver.calls(), 1);
        });
    }

    #[test]
    fn every_run_ends_in_one_bucket_with_full_audit(
        tier in tier_strategy(),
        forward in any::<bool>(),
        screening_include in any::<bool>(),
        script in proptest::collection::vec((any::<bool>(), any::<bool>()), 1..10),
        cap in 1u32..4,
    ) {
        runtime().block_on(async move {
            let policy = if forward {
                LikelyIrrelevantPolicy::ForwardWhenIncluded
            } else {
                LikelyIrrelevantPolicy::Discard
            };
            let decision = if screening_include {
                ScreeningDecision::Include
            } else {
                ScreeningDecision::Exclude
            };
            let log = Arc::new(InMemoryEventLog::new());
            let stages = StageRegistry::new(
                Arc::new(FixedDecision::classifier(tier)),
                Arc::new(FixedDecision::screener(decision)),
                Arc::new(ScriptedReviewer::sequence(script)),
                Arc::new(AmendingImprover::keep_label()),
            );
            let config = ScreeningConfig::new(NonZeroU32::new(cap).unwrap()).with_policy(policy);
            let pipeline = ScreeningPipeline::new(
                &config,
                stages,
                log.clone(),
                Arc::new(InMemoryResultStore::new()),
            );
            let citation = Citation::new(CitationMetadata::new("T", "A"));
            let id = citation.id();

            let result = pipeline.run(citation).await.unwrap();

            // exactly one disposition, and it is last
            let dispositions = result.history.iter().filter(|e| e.as_disposition().is_some()).count();
            assert_eq!(dispositions, 1);
            assert_eq!(result.history.last().and_then(LogEntry::as_disposition), Some(&result.disposition));
            assert_eq!(pipeline.sink().all().await.unwrap().len(), 1);

            // every decision is reviewed before anything else happens
            for (i, entry) in result.history.iter().enumerate() {
                if let Some(record) = entry.as_decision() {
                    let verdict = result.history[i + 1].as_review().expect("decision left unreviewed");
                    assert_eq!(verdict.reviews, record.id);
                }
            }

            // a gate never runs more than cap amendments
            for phase in [GatePhase::Triage, GatePhase::Screening] {
                let amendments = result
                    .decisions()
                    .filter(|r| r.phase == phase && r.is_revision())
                    .count();
                assert!(amendments <= cap as usize);
            }

            // the stored history is the log
            assert_eq!(log.history(id).await.unwrap(), result.history);
        });
    }
}
