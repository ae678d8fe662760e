use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use warden_execpolicy::default_whitelist;
use warden_protocol::ExecutionMode;
use warden_protocol::exec::DEFAULT_TIMEOUT_SECONDS;
use warden_utils_home_dir::find_warden_home;

use crate::error::ConfigError;

pub const CONFIG_TOML_FILE: &str = "config.toml";
pub const MISSIONS_SNAPSHOT_FILE: &str = "missions.json";

/// Output kept per stream before further bytes are dropped.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_AGENT_NAME: &str = "warden";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Base config deserialized from `$WARDEN_HOME/config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigToml {
    /// Global execution mode, used when a mission does not override it.
    pub execution_mode: Option<ExecutionMode>,

    /// Command prefixes that skip approval in whitelist mode.
    pub whitelist: Option<Vec<String>>,

    pub max_output_bytes: Option<usize>,

    pub default_timeout_seconds: Option<u64>,

    pub agent_name: Option<String>,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: Option<String>,

    #[serde(default)]
    pub storage: StorageToml,

    #[serde(default)]
    pub backend: BackendToml,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StorageToml {
    pub data_dir: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BackendToml {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

/// Values supplied on the command line; they win over the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub execution_mode: Option<ExecutionMode>,
    pub data_dir: Option<PathBuf>,
    pub max_output_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub api_url: String,
    pub api_key: String,
}

/// Fully resolved agent configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub warden_home: PathBuf,
    pub execution_mode: ExecutionMode,
    pub whitelist: Vec<String>,
    pub max_output_bytes: usize,
    pub default_timeout_seconds: u64,
    pub agent_name: String,
    pub log_level: String,
    pub data_dir: PathBuf,
    /// Present only when both the URL and the key are configured.
    pub backend: Option<BackendConfig>,
}

impl Config {
    /// Loads `config.toml` from the home directory named by `WARDEN_HOME`
    /// (default `~/.warden`).
    pub fn load_with_overrides(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let warden_home = find_warden_home().map_err(ConfigError::Home)?;
        Self::load_from_home(warden_home, overrides)
    }

    pub fn load_from_home(
        warden_home: PathBuf,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let config_toml = load_config_toml(&warden_home)?;
        Ok(Self::from_toml(config_toml, overrides, warden_home))
    }

    pub fn from_toml(cfg: ConfigToml, overrides: ConfigOverrides, warden_home: PathBuf) -> Self {
        let ConfigOverrides {
            execution_mode,
            data_dir,
            max_output_bytes,
        } = overrides;

        let data_dir = data_dir
            .or(cfg.storage.data_dir)
            .unwrap_or_else(|| warden_home.join("data"));
        let backend = match (cfg.backend.api_url, cfg.backend.api_key) {
            (Some(api_url), Some(api_key)) if !api_url.is_empty() && !api_key.is_empty() => {
                Some(BackendConfig { api_url, api_key })
            }
            _ => None,
        };

        Self {
            execution_mode: execution_mode.or(cfg.execution_mode).unwrap_or_default(),
            whitelist: cfg.whitelist.unwrap_or_else(default_whitelist),
            max_output_bytes: max_output_bytes
                .or(cfg.max_output_bytes)
                .unwrap_or(DEFAULT_MAX_OUTPUT_BYTES),
            default_timeout_seconds: cfg
                .default_timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            agent_name: cfg
                .agent_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(default_agent_name),
            log_level: cfg
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            data_dir,
            backend,
            warden_home,
        }
    }

    /// Configuration used when no file exists or it cannot be parsed.
    pub fn with_defaults(warden_home: PathBuf, overrides: ConfigOverrides) -> Self {
        Self::from_toml(ConfigToml::default(), overrides, warden_home)
    }

    pub fn missions_path(&self) -> PathBuf {
        self.data_dir.join(MISSIONS_SNAPSHOT_FILE)
    }
}

/// Reads `config.toml` under `warden_home`. A missing file yields defaults.
pub fn load_config_toml(warden_home: &Path) -> Result<ConfigToml, ConfigError> {
    let path = warden_home.join(CONFIG_TOML_FILE);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigToml::default());
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

fn default_agent_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string())
}
