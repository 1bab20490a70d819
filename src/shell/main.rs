use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use time_log::modules::time_log::application::history::TimeLogHistory;
use time_log::shared::infrastructure::entry_store::json_file::JsonFileEntryStore;
use time_log::shell::config::ShellConfig;
use time_log::shell::http::router;
use time_log::shell::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = ShellConfig::from_env()?;
    let store = Arc::new(JsonFileEntryStore::open(&config.data_path).await?);
    let history = TimeLogHistory::open(store, config.history).await?;

    let app = router(AppState::new(history.clone(), config.request_timeout));

    tracing::info!(
        data_path = %config.data_path.display(),
        "HTTP endpoint: http://{}",
        config.bind_addr
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    history.shutdown().await;
    tracing::info!("time log stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
