use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kirim=info,kirim_gateway=info,tower_http=warn".into()),
        )
        .init();

    // load config: explicit path > KIRIM_CONFIG env > ~/.kirim/kirim.toml
    let config_path = std::env::var("KIRIM_CONFIG").ok();
    let config =
        kirim_core::config::KirimConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            kirim_core::config::KirimConfig::default()
        });

    let tz = config.timezone()?;
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // initialize SQLite database — single file for all subsystems
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, timezone = %tz.name(), "opening SQLite database");

    let gateway_conn = rusqlite::Connection::open(db_path)?;
    gateway_conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    let store = kirim_store::Store::new(gateway_conn)?;

    // the tick driver gets its own connection for thread safety
    let driver_store = kirim_store::Store::new(rusqlite::Connection::open(db_path)?)?;

    // one long-lived messenger handle, injected everywhere messages go out
    let messenger: Arc<dyn kirim_channels::Messenger> =
        Arc::new(kirim_whatsapp::BridgeMessenger::new(&config.whatsapp)?);

    // bring the channel up in the background; sends fail cleanly until then
    let messenger_for_connect = Arc::clone(&messenger);
    tokio::spawn(async move {
        if let Err(e) = kirim_channels::backoff::connect_with_backoff(
            messenger_for_connect.as_ref(),
        )
        .await
        {
            warn!(error = %e, "WhatsApp bridge unreachable after retries");
        }
    });

    let driver = Arc::new(kirim_scheduler::TickDriver::new(
        driver_store,
        Arc::clone(&messenger),
        tz,
        config.scheduler.horizon_days,
        Duration::from_secs(config.scheduler.poll_interval_secs),
        Duration::from_secs(config.scheduler.job_timeout_secs),
        Duration::from_secs(config.whatsapp.media_timeout_secs),
    ));

    // spawn the tick loop in the background
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    if config.scheduler.enabled {
        tokio::spawn(Arc::clone(&driver).run(shutdown_rx));
    } else {
        warn!("scheduler disabled by config; only manual /api/scheduler/run ticks will fire");
    }

    let state = Arc::new(app::AppState::new(config, store, messenger, driver, tz));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Kirim gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // signal the tick driver to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
