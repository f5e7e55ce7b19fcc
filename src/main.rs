use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_ingest::infrastructure::AppState;
use catalog_ingest::{config, db, server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_ingest=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    // Check for --profile CLI argument
    let args: Vec<String> = std::env::args().collect();
    let profile = args
        .iter()
        .position(|arg| arg == "--profile")
        .and_then(|pos| args.get(pos + 1))
        .cloned();

    let config = config::Config::from_env_with_profile(profile);
    tracing::info!(
        "Starting with profile '{}', max batch size {}",
        config.profile,
        config.max_batch_size
    );

    // Initialize database
    let db = db::init_db(&config.database_url).await.map_err(|e| {
        tracing::error!("Failed to initialize database: {}", e);
        e
    })?;

    let state = AppState::new(db, config.max_batch_size);
    let app = server::build_router(state, &config.cors_allowed_origins);

    // Find available port
    let port = server::find_available_port(config.port)
        .ok_or("Failed to find an available port")?;

    if port != config.port {
        tracing::warn!(
            "Preferred port {} was not available, using port {} instead",
            config.port,
            port
        );
    }

    server::serve(app, port).await?;
    Ok(())
}
