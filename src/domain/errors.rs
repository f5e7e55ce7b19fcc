//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use std::fmt;

#[derive(Debug)]
pub enum DomainError {
    /// Database/persistence error
    Database(String),
    /// Generic internal error
    Internal(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::Database(msg) => write!(f, "Database error: {}", msg),
            DomainError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Database(e.to_string())
    }
}

/// Batch-level ingestion failure.
///
/// Record-level problems never end up here; they are folded into the
/// batch's rejection list instead.
#[derive(Debug)]
pub enum IngestError {
    /// The store failed; the batch was aborted and its open transaction rolled back
    Storage(String),
    /// The batch holds more records than the configured limit
    BatchTooLarge { size: usize, limit: usize },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Storage(msg) => write!(f, "Storage error: {}", msg),
            IngestError::BatchTooLarge { size, limit } => write!(
                f,
                "Batch of {} records exceeds the limit of {}",
                size, limit
            ),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<DomainError> for IngestError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Database(msg) => IngestError::Storage(msg),
            other => IngestError::Storage(other.to_string()),
        }
    }
}

impl From<sea_orm::DbErr> for IngestError {
    fn from(e: sea_orm::DbErr) -> Self {
        IngestError::Storage(e.to_string())
    }
}
