//! Scripted stages for tests and dry runs.
//!
//! Each mock counts its invocations so tests can assert exactly how many
//! times the pipeline called it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use screening_types::{
    Citation, DecisionRecord, Label, RecordId, ReviewVerdict, ScreeningDecision, StageKind,
    TriageTier,
};

use crate::error::StageError;
use crate::traits::{DecisionStage, ReviewStage, StageInput};

/// Classifier or Detailed Screening stage that always returns the same label.
pub struct FixedDecision {
    stage: StageKind,
    label: Label,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixedDecision {
    pub fn classifier(tier: TriageTier) -> Self {
        Self::new(StageKind::Classifier, Label::Triage(tier))
    }

    pub fn screener(decision: ScreeningDecision) -> Self {
        Self::new(StageKind::DetailedScreener, Label::Screening(decision))
    }

    /// Any stage/label pair, including inconsistent ones.
    pub fn new(stage: StageKind, label: Label) -> Self {
        Self {
            stage,
            label,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering, simulating a slow reasoning call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionStage for FixedDecision {
    fn stage_name(&self) -> &str {
        "Fixed Decision"
    }

    async fn decide(&self, _input: StageInput<'_>) -> Result<DecisionRecord, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(DecisionRecord::new(
            self.stage,
            self.label.phase(),
            self.label,
            format!("fixed {}", self.label),
        ))
    }
}

/// Reviewer that replays `(agree, include)` pairs in order, then repeats the last.
pub struct ScriptedReviewer {
    script: Mutex<VecDeque<(bool, bool)>>,
    last: Mutex<(bool, bool)>,
    wrong_record: bool,
    calls: AtomicUsize,
}

impl ScriptedReviewer {
    pub fn always(agree: bool, include: bool) -> Self {
        Self::sequence(vec![(agree, include)])
    }

    pub fn sequence(script: Vec<(bool, bool)>) -> Self {
        let last = script.last().copied().unwrap_or((true, true));
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            wrong_record: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Emit verdicts that reference an unrelated record.
    pub fn reviewing_wrong_record(mut self) -> Self {
        self.wrong_record = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> (bool, bool) {
        let mut script = self.script.lock().unwrap_or_else(|p| p.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(step) = script.pop_front() {
            *last = step;
        }
        *last
    }
}

#[async_trait]
impl ReviewStage for ScriptedReviewer {
    fn stage_name(&self) -> &str {
        "Scripted Reviewer"
    }

    async fn review(
        &self,
        _citation: &Citation,
        record: &DecisionRecord,
    ) -> Result<ReviewVerdict, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (agree, include) = self.next_step();
        let mut verdict = ReviewVerdict::new(
            record,
            agree,
            include,
            if agree { "consistent" } else { "inconsistent" },
        );
        if self.wrong_record {
            verdict.reviews = RecordId::new();
        }
        Ok(verdict)
    }
}

/// Improver that amends to a fixed label, or re-issues the prior label.
pub struct AmendingImprover {
    label: Option<Label>,
    back_reference: bool,
    calls: AtomicUsize,
}

impl AmendingImprover {
    /// Trivial amendment: same label, new record.
    pub fn keep_label() -> Self {
        Self {
            label: None,
            back_reference: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn to_label(label: Label) -> Self {
        Self {
            label: Some(label),
            back_reference: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Emit amendments whose `revision_of` is empty.
    pub fn without_back_reference(mut self) -> Self {
        self.back_reference = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionStage for AmendingImprover {
    fn stage_name(&self) -> &str {
        "Amending Improver"
    }

    async fn decide(&self, input: StageInput<'_>) -> Result<DecisionRecord, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prior = input.prior.ok_or_else(|| {
            StageError::malformed(StageKind::Improver, "no record to amend")
        })?;
        let label = self.label.unwrap_or(prior.label);
        let mut amended = DecisionRecord::revision(prior, label, "amended after review");
        if !self.back_reference {
            amended.revision_of = None;
        }
        Ok(amended)
    }
}

/// Stage that always fails with malformed output.
pub struct FailingStage {
    stage: StageKind,
}

impl FailingStage {
    pub fn new(stage: StageKind) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl DecisionStage for FailingStage {
    fn stage_name(&self) -> &str {
        "Failing Stage"
    }

    async fn decide(&self, _input: StageInput<'_>) -> Result<DecisionRecord, StageError> {
        Err(StageError::malformed(self.stage, "no decision marker in output"))
    }
}

#[async_trait]
impl ReviewStage for FailingStage {
    fn stage_name(&self) -> &str {
        "Failing Stage"
    }

    async fn review(
        &self,
        _citation: &Citation,
        _record: &DecisionRecord,
    ) -> Result<ReviewVerdict, StageError> {
        Err(StageError::malformed(self.stage, "no agreement marker in output"))
    }
}
