//! Evquery server binary.
//!
//! Entry point for the event-log query gateway: load configuration, open the
//! DuckDB store, start the cache sweep, and serve the HTTP API.
//!
//! # Configuration
//!
//! Sources in order of precedence:
//!
//! 1. Command-line arguments (highest precedence)
//! 2. Environment variables (prefixed with `EVQUERY_`)
//! 3. User-specified configuration file (via `--config`)
//! 4. System-wide configuration (`/etc/evquery/config.toml`)
//! 5. Default configuration (embedded in binary)
//!
//! ```text
//! Options:
//!   -c, --config <FILE>           Path to configuration file
//!       --host <HOST>             Server host address [env: EVQUERY_SERVER_HOST]
//!       --port <PORT>             Server port [env: EVQUERY_SERVER_PORT]
//!       --store-connection <STR>  Store connection string [env: EVQUERY_STORE_CONNECTION]
//!       --store-options <KEY=VAL> Store options, repeatable [env: EVQUERY_STORE_OPTIONS]
//!       --cache-ttl-ms <MS>       Result cache TTL in milliseconds [env: EVQUERY_CACHE_TTL_MS]
//! ```
//!
//! ## Configuration file format (TOML)
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3001
//!
//! [store]
//! connection = "events.db"   # ":memory:" for an in-memory store
//!
//! [store.options]
//! threads = "4"
//! max_memory = "2GB"
//!
//! [cache]
//! ttl_ms = 30000
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use evquery_core::cache::ResultCache;
use evquery_core::config::{CliArgs, Settings};
use evquery_core::service::{router, AppState};
use evquery_core::storage::duckdb::DuckDbBackend;
use evquery_core::storage::StorageBackend;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli_args = CliArgs::parse();
    let settings = Settings::new(cli_args)?;

    let backend = DuckDbBackend::new_with_options(&settings.store.connection, &settings.store.options)?;
    backend.init().await?;

    let cache = ResultCache::new(Duration::from_millis(settings.cache.ttl_ms));
    let _sweeper = cache.spawn_sweeper();

    let state = AppState::new(Arc::new(backend), cache);
    let app = router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "query gateway listening");
    tracing::info!(
        store = %settings.store.connection,
        ttl_ms = settings.cache.ttl_ms,
        "compression, CORS, and result cache enabled"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
