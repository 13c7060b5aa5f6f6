//! Screening Gate: audited two-gate pipeline for literature citations.
//!
//! A citation is triaged, audited, optionally screened in detail, audited
//! again, and committed to exactly one disposition bucket.
//!
//! ## Invariants
//!
//! - **Audit coverage**: every Classifier and Detailed Screening record is
//!   reviewed before anything consumes it.
//! - **No advance on disagreement**: a record leaves a gate only with an
//!   agreeing verdict, or the gate ends `CycleExhausted`.
//! - **Bounded correction**: at most `max_correction_cycles` Improver
//!   amendments per gate, each one re-reviewed.
//! - **Terminal uniqueness**: one `PipelineResult` per citation, in one of
//!   Include, Discard, manual review, errored, incomplete.
//! - **Append-only history**: every well-formed record and verdict is in the
//!   Event Log before anything acts on it. Output rejected as malformed is
//!   never appended; the `Errored` disposition that ends the history carries
//!   the failing stage and the reason.
//! - **Single commit**: cancellation and timeouts only interrupt stage
//!   invocations. Once a disposition is decided it is committed, and a
//!   citation is screened by at most one run at a time.
//!
//! ## Flow
//!
//! 1. **Classifier** labels the citation with a triage tier
//! 2. **Gate 1** reviews it, looping through the Improver on disagreement
//! 3. **Routing** discards or forwards on the tier and the include flag
//! 4. **Detailed Screening** decides include / exclude
//! 5. **Gate 2** reviews that decision the same way
//! 6. **Decision Sink** commits the disposition with the full history

pub mod config;
pub mod error;
pub mod gate;
pub mod mocks;
pub mod pipeline;
pub mod service;
pub mod sink;
pub mod stages;
pub mod stats;
pub mod telemetry;
pub mod traits;

pub use config::{ConfigError, LikelyIrrelevantPolicy, LoggingConfig, MarkerConfig, ScreeningConfig};
pub use error::{GateError, StageError};
pub use gate::{GateController, GateOutcome};
pub use pipeline::{route_after_triage, GateBinding, ScreeningPipeline, StageRegistry, TriageRoute};
pub use service::{BatchReport, ScreeningService, SubmissionHandle};
pub use sink::DecisionSink;
pub use stages::{MarkerDecisionStage, MarkerReviewStage, ReasoningBackend, ReasoningRequest};
pub use stats::{GateSnapshot, ScreeningStats, StatsSnapshot};
pub use telemetry::init_tracing;
pub use traits::{DecisionStage, ReviewStage, StageInput};
