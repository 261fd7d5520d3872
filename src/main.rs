use tracing_subscriber::EnvFilter;
use visa_api::{app, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("visa_api=info,tower_http=info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();
    tracing::info!("Starting Visa API in {:?} mode", config.environment);

    let bind_addr = config.bind_address();
    let state = AppState::from_config(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Visa API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
