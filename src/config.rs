//! Service configuration.
//!
//! Merged in order (later wins):
//! 1. built-in defaults,
//! 2. `book-search.toml` (or the file named by `BOOK_SEARCH_CONFIG`),
//! 3. `BOOK_SEARCH_*` environment variables,
//! 4. the plain `PORT` and `DYNAMODB_TABLE_BOOKS` variables used by existing deployments.
//!
//! When no table is configured the service runs on the in-memory store.

use crate::search::aggregator::FanoutConfig;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "book-search.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// DynamoDB table holding the books. `None` selects the in-memory store.
    pub books_table: Option<String>,
    pub prefix_index: String,
    pub shard_index: String,
    /// JSONL file loaded into the in-memory store at startup.
    pub seed_file: Option<PathBuf>,
    /// Per-shard budget of a fan-out, in ms. 0 disables.
    pub shard_timeout_ms: u64,
    /// Whole fan-out budget, in ms. 0 disables.
    pub deadline_ms: u64,
    /// Default filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            books_table: None,
            prefix_index: "TitlePrefixIndex".to_string(),
            shard_index: "ShardIndex".to_string(),
            seed_file: None,
            shard_timeout_ms: 2_000,
            deadline_ms: 5_000,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from the default file and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let file = std::env::var("BOOK_SEARCH_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("BOOK_SEARCH_"))
            .merge(Env::raw().only(&["PORT"]))
            .merge(
                Env::raw()
                    .only(&["DYNAMODB_TABLE_BOOKS"])
                    .map(|_| "books_table".into()),
            );

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut settings: Settings = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

        if settings
            .books_table
            .as_deref()
            .is_some_and(|table| table.trim().is_empty())
        {
            settings.books_table = None;
        }
        if settings.prefix_index.trim().is_empty() || settings.shard_index.trim().is_empty() {
            anyhow::bail!("Invalid configuration: index names must not be empty");
        }
        Ok(settings)
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {}:{}: {}", self.host, self.port, e))
    }

    pub fn fanout_config(&self) -> FanoutConfig {
        FanoutConfig {
            shard_timeout: non_zero_millis(self.shard_timeout_ms),
            deadline: non_zero_millis(self.deadline_ms),
        }
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
