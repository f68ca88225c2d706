use anyhow::Context;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use auth_crud_api::{
    config, database, mail, routes,
    server::{self, Shutdown, Supervisor},
    state::AppState,
};

/// Store pings before the watchdog gives up
const STORE_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const STORE_MAX_FAILURES: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = config::config().clone();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Auth CRUD API in {:?} mode", config.environment);

    let store = database::connect(&config.database)
        .await
        .context("failed to connect to the document store")?;
    let mailer = mail::from_config(&config.email).context("failed to configure email transport")?;

    let (supervisor, fatal) = Supervisor::new();
    if config.database.url.is_some() {
        supervisor.spawn(
            "store-watchdog",
            server::watch_store(store.clone(), STORE_CHECK_INTERVAL, STORE_MAX_FAILURES),
        );
    }

    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Auth CRUD API listening on http://{}", bind_addr);

    let state = AppState::new(config, store.clone(), mailer, supervisor);
    let shutdown = server::serve(listener, routes::app(state), fatal).await?;

    store.close().await;

    match shutdown {
        Shutdown::Signal => {
            tracing::info!("Server stopped");
            Ok(())
        }
        Shutdown::Fatal(reason) => anyhow::bail!("server stopped after fatal error: {}", reason),
    }
}
