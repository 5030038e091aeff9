use shuttle_votes::Config;
use shuttle_votes::startup::{AppState, build_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    info!(
        threshold = config.vote_threshold,
        refresh_secs = config.refresh_interval.as_secs(),
        "configuration loaded"
    );

    let app_state = AppState::new(&config).await?;
    let app = build_router(app_state);

    let addr = config.bind_addr;
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
