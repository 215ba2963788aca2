//! # flowstate-cli
//!
//! Library side of the `flowstate` binary: configuration loading, the demo
//! scenarios and output formatting. The binary only parses arguments and
//! wires these together.

pub mod config;
pub mod output;
pub mod scenarios;

use config::{Backend, CliConfig};
use flowstate_checkpoint::{CheckpointSaver, InMemoryCheckpointSaver, SqliteCheckpointSaver};
use serde_json::Value;
use std::sync::Arc;

pub use config::{ConfigError, Overrides};
pub use scenarios::Scenario;

/// Open the checkpoint backend selected by `config`
pub async fn open_checkpointer(config: &CliConfig) -> flowstate_checkpoint::Result<Arc<dyn CheckpointSaver>> {
    match config.backend {
        Backend::Memory => Ok(Arc::new(InMemoryCheckpointSaver::new())),
        Backend::Sqlite => {
            let saver = SqliteCheckpointSaver::connect(&config.database_url).await?;
            tracing::debug!(url = %config.database_url, "Opened SQLite checkpointer");
            Ok(Arc::new(saver))
        }
    }
}

/// Resume values are JSON when they parse as JSON, plain strings otherwise
pub fn parse_resume_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
