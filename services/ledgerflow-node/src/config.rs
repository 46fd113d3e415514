//! Node configuration.
//!
//! Everything the core recognizes per spec §6: `event_store_path` and
//! `command_channel_capacity`. Logging knobs are the only addition — they
//! belong to the ambient stack, not the core, but have to live somewhere
//! concrete for a runnable binary. Network endpoints, auth, and anything
//! else belongs to a future external collaborator, not here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_event_store_path")]
    pub event_store_path: PathBuf,

    #[serde(default = "default_channel_capacity")]
    pub command_channel_capacity: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            event_store_path: default_event_store_path(),
            command_channel_capacity: default_channel_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_event_store_path() -> PathBuf {
    PathBuf::from("ledgerflow.jsonl")
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl NodeConfig {
    /// Loads configuration layered as: built-in defaults, an optional
    /// `--config` file, `config/default.toml` / `config/local.toml` if
    /// present, then `LEDGERFLOW__`-prefixed environment variables (for
    /// example `LEDGERFLOW__COMMAND_CHANNEL_CAPACITY=2048`), matching the
    /// layering `openibank-api-server` uses for its own config struct.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("LEDGERFLOW")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let node_config: NodeConfig = config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default node configuration");
            NodeConfig::default()
        });
        Ok(node_config)
    }
}
