use std::sync::Arc;

use async_trait::async_trait;
use screening_types::{
    Citation, DecisionRecord, GatePhase, Label, ReviewVerdict, ScreeningDecision, StageKind,
    TriageTier,
};

use crate::config::MarkerConfig;
use crate::error::StageError;
use crate::traits::{DecisionStage, ReviewStage, StageInput};

/// What a stage asks of the reasoning backend.
///
/// Prompt construction and model choice belong to the backend.
#[derive(Clone, Copy, Debug)]
pub struct ReasoningRequest<'a> {
    pub role: StageKind,
    pub phase: GatePhase,
    pub citation: &'a Citation,
    /// Record under review, under amendment, or given as context.
    pub prior: Option<&'a DecisionRecord>,
    pub verdict: Option<&'a ReviewVerdict>,
}

/// External reasoning collaborator returning free text with decision markers.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn complete(&self, request: ReasoningRequest<'_>) -> anyhow::Result<String>;
}

fn contains_marker(haystack: &str, marker: &str) -> bool {
    haystack.contains(&marker.to_lowercase())
}

/// First marker present in `text`, in the order given.
fn first_marker<T: Copy>(text: &str, candidates: &[(&str, T)]) -> Option<T> {
    let lowered = text.to_lowercase();
    candidates
        .iter()
        .find(|(marker, _)| contains_marker(&lowered, marker))
        .map(|(_, value)| *value)
}

fn backend_error(stage: StageKind, err: anyhow::Error) -> StageError {
    StageError::Backend {
        stage,
        reason: format!("{err:#}"),
    }
}

/// Classifier, Detailed Screening or Improver driven by a [`ReasoningBackend`].
pub struct MarkerDecisionStage {
    role: StageKind,
    name: String,
    backend: Arc<dyn ReasoningBackend>,
    markers: MarkerConfig,
}

impl MarkerDecisionStage {
    pub fn classifier(backend: Arc<dyn ReasoningBackend>, markers: MarkerConfig) -> Self {
        Self::with_role(StageKind::Classifier, backend, markers)
    }

    pub fn screener(backend: Arc<dyn ReasoningBackend>, markers: MarkerConfig) -> Self {
        Self::with_role(StageKind::DetailedScreener, backend, markers)
    }

    pub fn improver(backend: Arc<dyn ReasoningBackend>, markers: MarkerConfig) -> Self {
        Self::with_role(StageKind::Improver, backend, markers)
    }

    fn with_role(role: StageKind, backend: Arc<dyn ReasoningBackend>, markers: MarkerConfig) -> Self {
        Self {
            role,
            name: format!("marker {role}"),
            backend,
            markers,
        }
    }

    /// The gate this invocation answers for. The Improver stays in the
    /// gate of the record it amends.
    fn phase(&self, prior: Option<&DecisionRecord>) -> Result<GatePhase, StageError> {
        match self.role {
            StageKind::Classifier => Ok(GatePhase::Triage),
            StageKind::DetailedScreener => Ok(GatePhase::Screening),
            _ => prior
                .map(|record| record.phase)
                .ok_or_else(|| StageError::malformed(self.role, "no record to amend")),
        }
    }

    fn parse_label(&self, phase: GatePhase, text: &str) -> Result<Label, StageError> {
        let m = &self.markers;
        let label = match phase {
            GatePhase::Triage => first_marker(
                text,
                &[
                    (m.potentially_relevant.as_str(), Label::Triage(TriageTier::PotentiallyRelevant)),
                    (m.uncertain.as_str(), Label::Triage(TriageTier::Uncertain)),
                    (m.likely_irrelevant.as_str(), Label::Triage(TriageTier::LikelyIrrelevant)),
                ],
            ),
            GatePhase::Screening => first_marker(
                text,
                &[
                    (m.include.as_str(), Label::Screening(ScreeningDecision::Include)),
                    (m.exclude.as_str(), Label::Screening(ScreeningDecision::Exclude)),
                ],
            ),
        };
        label.ok_or_else(|| {
            StageError::malformed(self.role, format!("no {phase} decision marker in output"))
        })
    }
}

#[async_trait]
impl DecisionStage for MarkerDecisionStage {
    fn stage_name(&self) -> &str {
        &self.name
    }

    async fn decide(&self, input: StageInput<'_>) -> Result<DecisionRecord, StageError> {
        let phase = self.phase(input.prior)?;
        let text = self
            .backend
            .complete(ReasoningRequest {
                role: self.role,
                phase,
                citation: input.citation,
                prior: input.prior,
                verdict: input.verdict,
            })
            .await
            .map_err(|e| backend_error(self.role, e))?;
        let label = self.parse_label(phase, &text)?;

        match (self.role, input.prior) {
            (StageKind::Improver, Some(prior)) => Ok(DecisionRecord::revision(prior, label, text)),
            _ => Ok(DecisionRecord::new(self.role, phase, label, text)),
        }
    }
}

/// Reviewer driven by a [`ReasoningBackend`].
///
/// Both an agreement marker and an inclusion marker are required.
pub struct MarkerReviewStage {
    backend: Arc<dyn ReasoningBackend>,
    markers: MarkerConfig,
}

impl MarkerReviewStage {
    pub fn new(backend: Arc<dyn ReasoningBackend>, markers: MarkerConfig) -> Self {
        Self { backend, markers }
    }
}

#[async_trait]
impl ReviewStage for MarkerReviewStage {
    fn stage_name(&self) -> &str {
        "marker reviewer"
    }

    async fn review(
        &self,
        citation: &Citation,
        record: &DecisionRecord,
    ) -> Result<ReviewVerdict, StageError> {
        let text = self
            .backend
            .complete(ReasoningRequest {
                role: StageKind::Reviewer,
                phase: record.phase,
                citation,
                prior: Some(record),
                verdict: None,
            })
            .await
            .map_err(|e| backend_error(StageKind::Reviewer, e))?;

        let m = &self.markers;
        let agree = first_marker(&text, &[(m.agree.as_str(), true), (m.disagree.as_str(), false)])
            .ok_or_else(|| StageError::malformed(StageKind::Reviewer, "no agreement marker in output"))?;
        let include = first_marker(&text, &[(m.include.as_str(), true), (m.exclude.as_str(), false)])
            .ok_or_else(|| StageError::malformed(StageKind::Reviewer, "no inclusion marker in output"))?;

        Ok(ReviewVerdict::new(record, agree, include, text))
    }
}
