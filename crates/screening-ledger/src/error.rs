use screening_types::CitationId;
use thiserror::Error;

/// Errors from the event log and result store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("pipeline result already committed for citation: {0}")]
    DuplicateResult(CitationId),

    #[error("no history recorded for citation: {0}")]
    NotFound(CitationId),

    #[error("ledger backend unavailable: {0}")]
    Unavailable(String),
}
