//! CLI configuration management

use chainfill_t8n::T8nConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::CliError;

/// CLI configuration, read from `~/.chainfill/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Transition tool binary
    #[serde(default = "default_evm_bin")]
    pub evm_bin: PathBuf,
    /// Arguments placed before the `t8n` flags, for wrappers such as `docker run`
    #[serde(default)]
    pub evm_args: Vec<String>,
    /// Seconds before a transition tool call is killed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Collect execution traces for failure diagnostics
    #[serde(default)]
    pub trace: bool,
    /// Chain id replacing the one in test definitions
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Directory receiving every transition tool input and output
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
}

fn default_evm_bin() -> PathBuf {
    PathBuf::from("evm")
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            evm_bin: default_evm_bin(),
            evm_args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            trace: false,
            chain_id: None,
            debug_dir: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".chainfill"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load the config at `path`, or the default config file when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// or an unparsable one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load config from `path`
    pub fn load_from(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Transition tool settings derived from this config
    pub fn t8n_config(&self) -> T8nConfig {
        T8nConfig {
            binary: self.evm_bin.clone(),
            extra_args: self.evm_args.clone(),
            timeout_secs: self.timeout_secs,
            trace: self.trace,
            debug_dir: self.debug_dir.clone(),
        }
    }
}
