//! CLI configuration
//!
//! Settings come from, in increasing priority:
//! 1. Default values
//! 2. A config file: `--config <path>`, or the first of `flowstate.yaml`,
//!    `flowstate.yml`, `flowstate.toml` found in the working directory
//! 3. Command line flags (and their environment variables)
//!
//! String values may reference environment variables as `${NAME}` or
//! `${NAME:default}`:
//!
//! ```yaml
//! backend: sqlite
//! database_url: "sqlite://${FLOWSTATE_HOME:.}/threads.db"
//! recursion_limit: 25
//! log_filter: "info,flowstate_core=debug"
//! ```

use flowstate_core::DEFAULT_RECURSION_LIMIT;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// File names looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] = ["flowstate.yaml", "flowstate.yml", "flowstate.toml"];

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").unwrap());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported config format: {} (expected .yaml, .yml or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where threads are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Threads live for one process
    #[default]
    Memory,
    /// Threads are kept in a SQLite database
    Sqlite,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub backend: Backend,

    /// Used by the sqlite backend
    pub database_url: String,

    #[serde(deserialize_with = "number_or_string")]
    pub recursion_limit: usize,

    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set
    pub log_filter: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            database_url: "sqlite://flowstate.db".to_string(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            log_filter: "warn".to_string(),
        }
    }
}

/// Command line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<Backend>,
    pub database_url: Option<String>,
    pub recursion_limit: Option<usize>,
    pub log_filter: Option<String>,
}

impl CliConfig {
    /// Load `path`, or the first default file found in `dir`, or defaults
    pub fn load(path: Option<&Path>, dir: &Path) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => DEFAULT_CONFIG_FILES
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file()),
        };

        match path {
            Some(path) => {
                let config = Self::from_file(&path)?;
                tracing::debug!(path = %path.display(), "Loaded config file");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        // an empty YAML document parses as null
        if value.is_null() {
            value = Value::Object(Default::default());
        }
        expand_variables(&mut value);

        let config: Self = serde_json::from_value(value).map_err(|e| parse_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if let Some(url) = overrides.database_url {
            self.database_url = url;
        }
        if let Some(limit) = overrides.recursion_limit {
            self.recursion_limit = limit;
        }
        if let Some(filter) = overrides.log_filter {
            self.log_filter = filter;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recursion_limit == 0 {
            return Err(ConfigError::Invalid("recursion_limit must be at least 1".to_string()));
        }
        if self.backend == Backend::Sqlite && !self.database_url.starts_with("sqlite:") {
            return Err(ConfigError::Invalid(format!(
                "database_url '{}' is not a sqlite URL",
                self.database_url
            )));
        }
        Ok(())
    }
}

/// Replace `${NAME:default}` placeholders in every string of `value`
pub fn expand_variables(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                *s = expanded;
            }
        }
        Value::Object(map) => map.values_mut().for_each(expand_variables),
        Value::Array(items) => items.iter_mut().for_each(expand_variables),
        _ => {}
    }
}

fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }

    let expanded = ENV_PLACEHOLDER.replace_all(s, |caps: &regex::Captures| {
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(&caps[1]).unwrap_or_else(|_| default.to_string())
    });
    Some(expanded.into_owned())
}

/// Accept `25` as well as `"25"`, which is what an expanded placeholder yields
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(usize),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
