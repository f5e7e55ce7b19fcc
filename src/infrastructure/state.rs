//! Application state containing the ingestion service and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::services::IngestService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    /// Bulk ingestion engine
    pub ingest: Arc<IngestService>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, max_batch_size: usize) -> Self {
        let ingest = Arc::new(IngestService::new(db.clone(), max_batch_size));
        Self { db, ingest }
    }
}

// Implement FromRef to allow extracting DatabaseConnection from AppState
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
