pub mod health;
pub mod ingest;

use axum::{
    Router,
    routing::{get, post},
};

use crate::infrastructure::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Bulk ingestion
        .route("/books/bulk", post(ingest::create_books))
        .route("/chapters/bulk", post(ingest::create_chapters))
        .route(
            "/books-and-chapters/bulk",
            post(ingest::create_books_and_chapters),
        )
        // Legacy paths kept for existing clients
        .route("/create-book", post(ingest::create_books))
        .route("/bulk-create-chapters", post(ingest::create_chapters))
        .route(
            "/bulk-create-books-and-chapters",
            post(ingest::create_books_and_chapters),
        )
        .with_state(state)
}
