//! Core type definitions for the citation screening pipeline.
//!
//! This crate provides the shared data model. No business logic, just types
//! and the few state-transition rules that belong to the types themselves.
//! Every screening crate depends on this crate.

pub mod citation;
pub mod disposition;
pub mod history;
pub mod ids;
pub mod label;
pub mod record;
pub mod state;

pub use citation::{Citation, CitationMetadata};
pub use disposition::{Disposition, DispositionBucket, IncompleteReason, PipelineResult};
pub use history::{LogEntry, LogEvent};
pub use ids::{CitationId, RecordId, VerdictId};
pub use label::{GatePhase, Label, ScreeningDecision, StageKind, TriageTier};
pub use record::{DecisionRecord, ReviewVerdict};
pub use state::{PipelineState, TransitionError};
