//! Task store settings.
//!
//! Three settings shape the store: where it listens, how large a request
//! body it accepts, and which tasks it starts with. Each comes from the first
//! layer that sets it: flags (or their `TASKFLOW_*` variables), then the
//! `[server]` table of `config.toml`, then built-in values. The merged
//! result is checked before the store starts.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use taskflow_proto::task::NewTask;

const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Errors raised while assembling the store settings.
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

    /// The seed file could not be read or decoded.
    #[error("cannot load seed tasks from {path}: {reason}")]
    Seed {
        /// Seed file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

/// One layer of settings; unset fields fall through to the layer below.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Settings {
    bind_addr: Option<String>,
    max_body_size: Option<usize>,
    seed_file: Option<PathBuf>,
}

impl Settings {
    fn over(self, lower: Self) -> Self {
        Self {
            bind_addr: self.bind_addr.or(lower.bind_addr),
            max_body_size: self.max_body_size.or(lower.max_body_size),
            seed_file: self.seed_file.or(lower.seed_file),
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    server: Settings,
}

/// Command-line flags of `taskflow-server`.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "TaskFlow task store")]
pub struct ServerCliArgs {
    /// Socket address to listen on.
    #[arg(short, long, env = "TASKFLOW_BIND")]
    pub bind: Option<String>,

    /// Config file; `~/.config/taskflow-server/config.toml` is tried when absent.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Largest accepted request body, in bytes.
    #[arg(long)]
    pub max_body_size: Option<usize>,

    /// JSON array of create bodies added before the store starts serving.
    #[arg(long)]
    pub seed_file: Option<PathBuf>,

    /// Tracing filter, e.g. `info` or `taskflow_server=debug`.
    #[arg(long, default_value = "info", env = "TASKFLOW_SERVER_LOG")]
    pub log_level: String,
}

impl ServerCliArgs {
    fn settings(&self) -> Settings {
        Settings {
            bind_addr: self.bind.clone(),
            max_body_size: self.max_body_size,
            seed_file: self.seed_file.clone(),
        }
    }
}

/// Checked store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listening address.
    pub bind_addr: SocketAddr,
    /// Largest accepted request body, in bytes. Never zero.
    pub max_body_size: usize,
    /// Tasks to create at startup.
    pub seed_file: Option<PathBuf>,
    /// Tracing filter.
    pub log_level: String,
}

impl ServerConfig {
    /// Merges flags with the config file and checks the result.
    ///
    /// A file named with `--config` must exist; the default file may be
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// the bind address or body limit is unusable.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => read_layer(path, true)?,
            None => match default_config_path() {
                Some(path) => read_layer(&path, false)?,
                None => Settings::default(),
            },
        };
        Self::from_settings(cli.settings().over(file), &cli.log_level)
    }

    fn from_settings(settings: Settings, log_level: &str) -> Result<Self, ConfigError> {
        let bind = settings.bind_addr.as_deref().unwrap_or(DEFAULT_BIND);
        let bind_addr = bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bind address {bind:?} is not host:port")))?;

        let max_body_size = settings.max_body_size.unwrap_or(DEFAULT_BODY_LIMIT);
        if max_body_size == 0 {
            return Err(ConfigError::Invalid(
                "max_body_size must be at least 1 byte".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            max_body_size,
            seed_file: settings.seed_file,
            log_level: log_level.to_string(),
        })
    }
}

/// Reads the tasks listed in a seed file.
///
/// # Errors
///
/// Returns [`ConfigError::Seed`] if the file cannot be read or is not a JSON
/// array of create bodies.
pub fn load_seed_file(path: &Path) -> Result<Vec<NewTask>, ConfigError> {
    let seed_error = |reason: String| ConfigError::Seed {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| seed_error(e.to_string()))?;
    taskflow_proto::codec::decode(&bytes).map_err(|e| seed_error(e.to_string()))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskflow-server").join("config.toml"))
}

/// Reads the `[server]` table of `path`. A missing file is an empty layer
/// unless `required` is set.
fn read_layer(path: &Path, required: bool) -> Result<Settings, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Settings::default());
        }
        Err(source) => {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str::<ConfigFile>(&contents)
        .map(|file| file.server)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("taskflow-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn file_layer(toml_str: &str) -> Settings {
        toml::from_str::<ConfigFile>(toml_str).unwrap().server
    }

    #[test]
    fn built_in_values_apply_when_nothing_is_set() {
        let config = ServerConfig::from_settings(Settings::default(), "info").unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.max_body_size, 64 * 1024);
        assert!(config.seed_file.is_none());
    }

    #[test]
    fn file_fills_what_flags_leave_unset() {
        let file = file_layer(
            r#"
[server]
max_body_size = 2048
seed_file = "/srv/taskflow/seed.json"
"#,
        );
        let cli = ServerCliArgs {
            bind: Some("127.0.0.1:9000".to_string()),
            ..ServerCliArgs::default()
        };
        let config = ServerConfig::from_settings(cli.settings().over(file), "debug").unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.max_body_size, 2048);
        assert_eq!(config.seed_file, Some(PathBuf::from("/srv/taskflow/seed.json")));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn flags_beat_file() {
        let file = file_layer("[server]\nbind_addr = \"127.0.0.1:8080\"\nmax_body_size = 10");
        let cli = ServerCliArgs {
            max_body_size: Some(99),
            ..ServerCliArgs::default()
        };
        let merged = cli.settings().over(file);
        assert_eq!(merged.bind_addr.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(merged.max_body_size, Some(99));
    }

    #[test]
    fn zero_body_limit_is_rejected() {
        let settings = Settings {
            max_body_size: Some(0),
            ..Settings::default()
        };
        assert!(matches!(
            ServerConfig::from_settings(settings, "info"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unparseable_bind_address_is_rejected() {
        let settings = Settings {
            bind_addr: Some("localhost".to_string()),
            ..Settings::default()
        };
        assert!(matches!(
            ServerConfig::from_settings(settings, "info"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn misspelled_key_is_a_parse_error() {
        let path = temp_file("typo.toml", "[server]\nmax_body = 10\n");
        let result = read_layer(&path, true);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn named_config_file_must_exist() {
        let missing = Path::new("/nonexistent/taskflow-server.toml");
        assert!(matches!(
            read_layer(missing, true),
            Err(ConfigError::ReadFile { .. })
        ));
        assert_eq!(read_layer(missing, false).unwrap(), Settings::default());
    }

    #[test]
    fn load_reads_named_file() {
        let path = temp_file("server.toml", "[server]\nbind_addr = \"127.0.0.1:7000\"\n");
        let cli = ServerCliArgs {
            config: Some(path.clone()),
            ..ServerCliArgs::default()
        };
        let config = ServerConfig::load(&cli);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.unwrap().bind_addr, "127.0.0.1:7000".parse().unwrap());
    }

    #[test]
    fn missing_seed_file_is_an_error() {
        let result = load_seed_file(Path::new("/nonexistent/seed.json"));
        assert!(matches!(result, Err(ConfigError::Seed { .. })));
    }

    #[test]
    fn seed_file_holds_create_bodies() {
        let path = temp_file(
            "seed.json",
            r#"[{"title":"Water plants","priority":"low"},{"title":"Pay rent"}]"#,
        );
        let seed = load_seed_file(&path);
        std::fs::remove_file(&path).unwrap();
        let seed = seed.unwrap();
        assert_eq!(seed.len(), 2);
        assert_eq!(seed[0].title, "Water plants");
    }
}
