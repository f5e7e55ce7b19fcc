//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no SeaORM, no Axum).
//! Only trait definitions, normalization rules, result and error types.

pub mod errors;
pub mod ingest;
pub mod normalize;
pub mod repositories;

pub use errors::{DomainError, IngestError};
pub use ingest::*;
pub use normalize::{NormalizedName, normalize_name, normalize_title};
pub use repositories::*;
