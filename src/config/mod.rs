//! Endpoint configuration
//!
//! The selected RPC endpoint is persisted as `rpc.json` in the data
//! directory. Nothing reads it implicitly: callers resolve an endpoint
//! and build a [`LedgerContext`], which is then passed to every operation.

pub mod context;

pub use context::{ContextError, LedgerContext};

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEVNET_URL: &str = "https://api.devnet.solana.com";
pub const MAINNET_BETA_URL: &str = "https://api.mainnet-beta.solana.com";

/// File name of the persisted endpoint selection
pub const RPC_CONFIG_FILE: &str = "rpc.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Custom endpoint selected but no URL configured")]
    MissingCustomUrl,
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

/// Which cluster to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RpcPreset {
    #[default]
    Devnet,
    MainnetBeta,
    Custom,
}

impl RpcPreset {
    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            Self::Devnet => Some(DEVNET_URL),
            Self::MainnetBeta => Some(MAINNET_BETA_URL),
            Self::Custom => None,
        }
    }
}

/// Persisted endpoint selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RpcConfig {
    pub preset: RpcPreset,
    /// Only used with [`RpcPreset::Custom`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_url: Option<String>,
}

impl RpcConfig {
    pub fn preset(preset: RpcPreset) -> Self {
        Self {
            preset,
            custom_url: None,
        }
    }

    pub fn custom(url: &str) -> Result<Self, ConfigError> {
        validate_url(url)?;
        Ok(Self {
            preset: RpcPreset::Custom,
            custom_url: Some(url.trim().to_string()),
        })
    }

    /// The endpoint URL this configuration selects
    pub fn resolve_endpoint(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.preset.default_url() {
            return Ok(url.to_string());
        }
        let url = self
            .custom_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingCustomUrl)?;
        validate_url(url)?;
        Ok(url.to_string())
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;
    if rest.is_empty() || rest.starts_with('/') || rest.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// Loads and saves [`RpcConfig`] under a data directory
pub struct ConfigStore {
    data_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(RPC_CONFIG_FILE)
    }

    /// Load the saved configuration, or the default if none was saved
    pub fn load(&self) -> Result<RpcConfig, ConfigError> {
        let path = self.path();
        if !path.exists() {
            return Ok(RpcConfig::default());
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, config: &RpcConfig) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.data_dir)?;
        let data = serde_json::to_string_pretty(config)?;
        fs::write(self.path(), data)?;
        log::info!("Saved RPC configuration to {:?}", self.path());
        Ok(())
    }
}
