use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ChatError;

const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024; // 64 KiB

pub const DEFAULT_MODEL: &str = "sonnet";
pub const DEFAULT_EXECUTABLE: &str = "claude";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_EXECUTABLE: &str = "CLICHAT_EXECUTABLE";
pub const ENV_MODEL: &str = "CLICHAT_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "CLICHAT_TIMEOUT_SECS";
pub const ENV_EXTRA_PATH: &str = "CLICHAT_EXTRA_PATH";

// --- TOML deserialization struct (private, maps 1:1 to the file schema) ---

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    model: Option<String>,
    executable: Option<PathBuf>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    streaming: Option<bool>,
    timeout_secs: Option<u64>,
    #[serde(default)]
    extra_path: Vec<PathBuf>,
}

/// Settings for [`ClaudeCliProvider`](crate::providers::claude_cli::ClaudeCliProvider).
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub model: String,
    pub executable: PathBuf,
    /// Accepted for interface parity; the CLI has no flag for it.
    pub max_tokens: Option<u32>,
    /// Accepted for interface parity; the CLI has no flag for it.
    pub temperature: Option<f32>,
    pub streaming: bool,
    pub timeout: Duration,
    /// Directories prepended to the inherited PATH before lookup and spawn.
    pub extra_path: Vec<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            max_tokens: None,
            temperature: None,
            streaming: false,
            timeout: DEFAULT_TIMEOUT,
            extra_path: Vec::new(),
        }
    }
}

impl FromStr for ProviderConfig {
    type Err = ChatError;

    /// Parse a config from a TOML string. Absent keys keep their defaults.
    fn from_str(content: &str) -> Result<Self, ChatError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ChatError::Config(e.to_string()))?;

        let mut config = Self::default();
        if let Some(model) = file.model {
            config.model = model;
        }
        if let Some(executable) = file.executable {
            config.executable = executable;
        }
        if let Some(streaming) = file.streaming {
            config.streaming = streaming;
        }
        if let Some(secs) = file.timeout_secs {
            config.timeout = timeout_from_secs(secs)?;
        }
        if let Some(temperature) = file.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ChatError::Config(format!(
                    "temperature {temperature} outside 0.0..=1.0"
                )));
            }
            config.temperature = Some(temperature);
        }
        config.max_tokens = file.max_tokens;
        config.extra_path = file.extra_path;

        Ok(config)
    }
}

impl ProviderConfig {
    /// Load a config from a TOML file. Checks file size before reading.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| ChatError::Config(format!("cannot read {}: {e}", path.display())))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ChatError::Config(format!(
                "config file exceeds {MAX_CONFIG_FILE_SIZE} byte limit"
            )));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("cannot read {}: {e}", path.display())))?;

        content.parse()
    }

    /// Apply `CLICHAT_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ChatError> {
        self.with_overrides_from(|key| std::env::var_os(key))
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ChatError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(executable) = get(ENV_EXECUTABLE) {
            self.executable = PathBuf::from(executable);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model.to_string_lossy().into_owned();
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let raw = raw.to_string_lossy();
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ChatError::Config(format!("{ENV_TIMEOUT_SECS}: '{raw}' is not a number of seconds"))
            })?;
            self.timeout = timeout_from_secs(secs)?;
        }
        if let Some(extra) = get(ENV_EXTRA_PATH) {
            let mut dirs: Vec<PathBuf> = std::env::split_paths(&extra).collect();
            dirs.append(&mut self.extra_path);
            self.extra_path = dirs;
        }

        Ok(self)
    }
}

fn timeout_from_secs(secs: u64) -> Result<Duration, ChatError> {
    if secs == 0 {
        return Err(ChatError::Config("timeout must be at least one second".to_owned()));
    }
    Ok(Duration::from_secs(secs))
}
