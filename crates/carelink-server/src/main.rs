mod config;

use std::sync::Arc;

use tracing::info;

use carelink_api::router::app;
use carelink_api::state::AppStateInner;
use carelink_db::Database;
use carelink_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carelink_server=debug,carelink_api=debug,carelink_index=debug,carelink_db=debug,carelink_gateway=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    let state = AppStateInner::new(Arc::new(db), Dispatcher::new(), config.jwt_secret);

    let router = app(state);

    info!("CareLink server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
