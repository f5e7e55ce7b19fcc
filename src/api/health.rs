use axum::{Json, extract::State};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up; reports whether the database answers")
    )
)]
pub async fn health_check(State(db): State<DatabaseConnection>) -> Json<Value> {
    let database = match db.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("Health check: database ping failed: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "service": "catalog-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database
    }))
}
