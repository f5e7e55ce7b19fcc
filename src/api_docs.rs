use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::ingest::create_books,
        api::ingest::create_chapters,
        api::ingest::create_books_and_chapters,
    ),
    tags(
        (name = "catalog-ingest", description = "Bulk book and chapter ingestion API")
    )
)]
pub struct ApiDoc;
