//! Where the client finds the task store.
//!
//! Two settings matter: the store origin and an optional request timeout.
//! Flags (and `TASKFLOW_API_URL`) win over the `[api]` table of
//! `~/.config/taskflow/config.toml`, which wins over the built-in origin
//! `http://localhost:8000`. A file named with `--config` must exist.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::cli::Command;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Errors raised while assembling the client settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read {path}: {source}")]
    ReadFile {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A setting has an unusable value.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Connection {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    api: Connection,
}

/// Checked connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Origin of the task store, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Per-request timeout; `None` keeps the HTTP client's default.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Merges flags with the config file and checks the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, if the
    /// origin is not an `http`/`https` URL, or if the timeout is zero.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => read_connection(path, true)?,
            None => match dirs::config_dir() {
                Some(dir) => read_connection(&dir.join("taskflow").join("config.toml"), false)?,
                None => Connection::default(),
            },
        };
        let flags = Connection {
            base_url: cli.api_url.clone(),
            timeout_secs: cli.timeout,
        };
        Self::checked(flags, file)
    }

    fn checked(flags: Connection, file: Connection) -> Result<Self, ConfigError> {
        let base_url = flags
            .base_url
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        match Url::parse(&base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "store origin {base_url:?} is not an http(s) URL"
                )));
            }
        }

        let timeout = match flags.timeout_secs.or(file.timeout_secs) {
            Some(0) => {
                return Err(ConfigError::Invalid(
                    "timeout must be at least one second".to_string(),
                ));
            }
            secs => secs.map(Duration::from_secs),
        };

        Ok(Self { base_url, timeout })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "TaskFlow task list client")]
pub struct CliArgs {
    /// Origin of the task store.
    #[arg(long, env = "TASKFLOW_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Config file; `~/.config/taskflow/config.toml` is tried when absent.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Tracing filter for the client's own logs.
    #[arg(long, default_value = "warn", env = "TASKFLOW_LOG", global = true)]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// What to do; lists the tasks when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Reads the `[api]` table of `path`. A missing file is empty unless
/// `required` is set.
fn read_connection(path: &Path, required: bool) -> Result<Connection, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Connection::default());
        }
        Err(source) => {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str::<ConfigFile>(&contents)
        .map(|file| file.api)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}
