//! Services Layer
//!
//! This module contains pure business logic extracted from HTTP handlers.

pub mod ingest_service;
pub mod validation;

// Re-export for convenience
pub use ingest_service::{IngestService, RecordOutcome, ingest_book, ingest_chapter};
pub use validation::{one_or_many, validate_book, validate_chapter};
