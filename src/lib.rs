use anyhow::Result;

pub mod ai;
pub mod api;
pub mod config;
pub mod db;
pub mod export;
pub mod join;
pub mod system_info;
pub mod text_utils;

pub use api::{router as api_router, ApiError};
pub use config::Config;
pub use join::{build_prompt, normalize_tokens, split_prompt, JoinMode};
pub use system_info::get_system_info;

#[doc(hidden)]
pub mod tests {
    pub mod util;
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting {}", get_system_info());

    let db_url = db::prepare_sqlite_url(&config.db_url);
    tracing::info!(db_url = %db_url, "Connecting to database");
    let pool = db::connect_db(&db_url, config.max_connections).await?;
    let db = db::Database::new(pool);
    db.migrate().await?;
    tracing::info!("Database ready");

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, api_router(db))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
