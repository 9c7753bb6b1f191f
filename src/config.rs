//! Configuration management for the gateway.
//!
//! Configuration is layered from multiple sources, later sources overriding
//! earlier ones:
//! 1. Default configuration (embedded in the binary)
//! 2. System-wide configuration file (`/etc/evquery/config.toml`)
//! 3. User-specified configuration file (`--config`)
//! 4. Environment variables (prefixed with `EVQUERY_`)
//! 5. Command-line arguments

use clap::Parser;
use config::{Config, ConfigError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::cache::DEFAULT_TTL_MS;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const DEFAULT_CONFIG_PATH: &str = "/etc/evquery/config.toml";

/// Command-line arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server host address
    #[arg(long, env = "EVQUERY_SERVER_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(long, env = "EVQUERY_SERVER_PORT")]
    port: Option<u16>,

    /// Store connection string (":memory:" or a file path)
    #[arg(long, env = "EVQUERY_STORE_CONNECTION")]
    store_connection: Option<String>,

    /// Store options (key=value pairs, can be specified multiple times)
    #[arg(long, env = "EVQUERY_STORE_OPTIONS")]
    store_options: Option<Vec<String>>,

    /// Result cache time-to-live in milliseconds
    #[arg(long, env = "EVQUERY_CACHE_TTL_MS")]
    cache_ttl_ms: Option<u64>,
}

/// Complete service configuration.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Analytical store configuration
    pub store: StoreConfig,
    /// Result cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Network interface and port for the HTTP service.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Backing store configuration.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Connection string (":memory:" or a database file path)
    pub connection: String,
    /// Engine options (threads, max_memory, read_only)
    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// Result cache configuration.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Entry time-to-live in milliseconds; the sweep runs on the same period.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL_MS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

impl Settings {
    /// Loads configuration from all available sources.
    pub fn new(cli: CliArgs) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load default configuration
        builder = builder.add_source(config::File::from_str(
            DEFAULT_CONFIG,
            config::FileFormat::Toml,
        ));

        // Load system configuration if it exists
        if let Ok(metadata) = std::fs::metadata(DEFAULT_CONFIG_PATH) {
            if metadata.is_file() {
                builder =
                    builder.add_source(config::File::from(PathBuf::from(DEFAULT_CONFIG_PATH)));
            }
        }

        // Load user configuration if specified
        if let Some(ref config_path) = cli.config {
            builder = builder.add_source(config::File::from(config_path.clone()));
        }

        // Add environment variables (prefixed with EVQUERY_)
        builder = builder.add_source(config::Environment::with_prefix("EVQUERY"));

        // Override with command line arguments
        if let Some(ref host) = cli.host {
            builder = builder.set_override("server.host", host.as_str())?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(ref connection) = cli.store_connection {
            builder = builder.set_override("store.connection", connection.as_str())?;
        }
        if let Some(ref options) = cli.store_options {
            let options: HashMap<String, String> = options
                .iter()
                .filter_map(|opt| {
                    let parts: Vec<&str> = opt.split('=').collect();
                    if parts.len() == 2 {
                        Some((parts[0].to_string(), parts[1].to_string()))
                    } else {
                        None
                    }
                })
                .collect();
            builder = builder.set_override("store.options", options)?;
        }
        if let Some(ttl_ms) = cli.cache_ttl_ms {
            builder = builder.set_override("cache.ttl_ms", ttl_ms)?;
        }

        builder.build()?.try_deserialize()
    }
}
