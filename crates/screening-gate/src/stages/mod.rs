//! Stage adapters over a free-text reasoning backend.

mod marker;

pub use marker::{MarkerDecisionStage, MarkerReviewStage, ReasoningBackend, ReasoningRequest};
