use serde::{Deserialize, Serialize};

/// Coarse first-pass relevance tier assigned by the Classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageTier {
    PotentiallyRelevant,
    Uncertain,
    LikelyIrrelevant,
}

impl TriageTier {
    /// All tiers, in the order markers are checked.
    pub const ALL: [TriageTier; 3] = [
        TriageTier::PotentiallyRelevant,
        TriageTier::Uncertain,
        TriageTier::LikelyIrrelevant,
    ];
}

impl std::fmt::Display for TriageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriageTier::PotentiallyRelevant => "potentially relevant",
            TriageTier::Uncertain => "uncertain",
            TriageTier::LikelyIrrelevant => "likely irrelevant",
        };
        f.write_str(s)
    }
}

/// Include/exclude decision produced by Detailed Screening.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningDecision {
    Include,
    Exclude,
}

impl std::fmt::Display for ScreeningDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreeningDecision::Include => f.write_str("include"),
            ScreeningDecision::Exclude => f.write_str("exclude"),
        }
    }
}

/// Stage-specific label carried by a DecisionRecord.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "taxonomy", content = "value", rename_all = "snake_case")]
pub enum Label {
    Triage(TriageTier),
    Screening(ScreeningDecision),
}

impl Label {
    /// The gate whose taxonomy this label belongs to.
    pub fn phase(&self) -> GatePhase {
        match self {
            Label::Triage(_) => GatePhase::Triage,
            Label::Screening(_) => GatePhase::Screening,
        }
    }

    pub fn triage_tier(&self) -> Option<TriageTier> {
        match self {
            Label::Triage(tier) => Some(*tier),
            Label::Screening(_) => None,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Triage(tier) => write!(f, "triage:{tier}"),
            Label::Screening(decision) => write!(f, "screening:{decision}"),
        }
    }
}

/// The two audit points of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    /// Gate 1: Classifier output under review.
    Triage,
    /// Gate 2: Detailed Screening output under review.
    Screening,
}

impl std::fmt::Display for GatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatePhase::Triage => f.write_str("triage"),
            GatePhase::Screening => f.write_str("screening"),
        }
    }
}

/// The four stage roles that participate in the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Classifier,
    DetailedScreener,
    Reviewer,
    Improver,
}

impl StageKind {
    /// Stages whose output must be audited before the citation advances.
    pub fn is_primary(&self) -> bool {
        matches!(self, StageKind::Classifier | StageKind::DetailedScreener)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageKind::Classifier => "classifier",
            StageKind::DetailedScreener => "detailed_screener",
            StageKind::Reviewer => "reviewer",
            StageKind::Improver => "improver",
        };
        f.write_str(s)
    }
}
