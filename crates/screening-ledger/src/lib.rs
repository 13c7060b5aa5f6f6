//! Screening Ledger: the audit trail of the screening pipeline.
//!
//! Two stores live here:
//!
//! - **Event Log**: append-only record of every stage invocation and verdict,
//!   keyed by `(citation_id, sequence)`. Sequence numbers are strictly
//!   increasing per citation. No entry is ever overwritten or deleted.
//! - **Result Store**: one committed `PipelineResult` per citation. A second
//!   commit for the same citation is rejected.
//!
//! Both are traits so an external durable store can be plugged in; the
//! in-memory implementations shard by citation so concurrent runs never
//! contend on a global lock.

pub mod error;
pub mod event_log;
pub mod memory;
pub mod result_store;

pub use error::LedgerError;
pub use event_log::{EventLog, HistoryFilter};
pub use memory::{InMemoryEventLog, InMemoryResultStore};
pub use result_store::ResultStore;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
