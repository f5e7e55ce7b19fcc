use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::{BatchOutcome, IngestError};
use crate::infrastructure::AppState;
use crate::services::one_or_many;

fn batch_json<T: Serialize>(outcome: &BatchOutcome<T>) -> Value {
    json!({
        "accepted": outcome.accepted,
        "rejected": outcome.rejected,
        "accepted_count": outcome.accepted.len(),
        "rejected_count": outcome.rejected.len(),
    })
}

/// 201 as soon as one record made it in, 400 otherwise
fn batch_status(accepted: usize) -> StatusCode {
    if accepted > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    }
}

fn error_response(e: IngestError) -> Response {
    match e {
        IngestError::BatchTooLarge { size, limit } => (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({
                "error": "BatchTooLarge",
                "message": format!("Batch of {} records exceeds the limit of {}", size, limit),
                "limit": limit,
            })),
        )
            .into_response(),
        IngestError::Storage(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "StorageError", "message": msg })),
        )
            .into_response(),
    }
}

/// Malformed or non-JSON bodies get the same JSON error shape as everything else
fn invalid_json(rejection: JsonRejection) -> Response {
    tracing::debug!("Rejected request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid JSON", "message": rejection.body_text() })),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/books/bulk",
    responses(
        (status = 201, description = "At least one book was created"),
        (status = 400, description = "No book was created, or the body is not valid JSON"),
        (status = 413, description = "Batch exceeds the configured limit"),
        (status = 500, description = "Storage failure, batch aborted")
    )
)]
pub async fn create_books(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_json(rejection),
    };
    match state.ingest.ingest_books(one_or_many(body)).await {
        Ok(outcome) => (
            batch_status(outcome.accepted.len()),
            Json(batch_json(&outcome)),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/chapters/bulk",
    responses(
        (status = 201, description = "At least one chapter was created"),
        (status = 400, description = "No chapter was created, or the body is not valid JSON"),
        (status = 413, description = "Batch exceeds the configured limit"),
        (status = 500, description = "Storage failure, batch aborted")
    )
)]
pub async fn create_chapters(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_json(rejection),
    };
    match state.ingest.ingest_chapters(one_or_many(body)).await {
        Ok(outcome) => (
            batch_status(outcome.accepted.len()),
            Json(batch_json(&outcome)),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/books-and-chapters/bulk",
    responses(
        (status = 201, description = "At least one book or chapter was created"),
        (status = 400, description = "Nothing was created, or the body is not valid JSON"),
        (status = 413, description = "Batch exceeds the configured limit"),
        (status = 500, description = "Storage failure, nothing was written")
    )
)]
pub async fn create_books_and_chapters(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_json(rejection),
    };
    let Value::Object(mut payload) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "non_field_errors": ["Expected an object with \"books\" and \"chapters\"."]
            })),
        )
            .into_response();
    };

    let books = one_or_many(payload.remove("books").unwrap_or(Value::Null));
    let chapters = one_or_many(payload.remove("chapters").unwrap_or(Value::Null));

    match state.ingest.ingest_books_and_chapters(books, chapters).await {
        Ok(outcome) => {
            let accepted = outcome.books.accepted.len() + outcome.chapters.accepted.len();
            (
                batch_status(accepted),
                Json(json!({
                    "books": batch_json(&outcome.books),
                    "chapters": batch_json(&outcome.chapters),
                })),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}
