//! Retriever configuration
//!
//! Loaded from TOML with every field optional. Lookup order:
//! 1) an explicit path (CLI `--config`)
//! 2) `$PUNCHCARD_CONFIG`
//! 3) `./punchcard.toml`
//! 4) built-in defaults
//!
//! `PUNCHCARD_TIMEOUT_SECS` and `PUNCHCARD_TIME_BASIS` override the file afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::RetrieveError;
use crate::types::TimeBasis;

pub const ENV_CONFIG_PATH: &str = "PUNCHCARD_CONFIG";
pub const ENV_TIMEOUT_SECS: &str = "PUNCHCARD_TIMEOUT_SECS";
pub const ENV_TIME_BASIS: &str = "PUNCHCARD_TIME_BASIS";
pub const DEFAULT_CONFIG_FILE: &str = "punchcard.toml";

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How the Wikipedia source asks for contributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WikiTransport {
    /// `callback=` wrapped response, unwrapped client side
    #[default]
    Jsonp,
    /// Plain JSON response
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Base URL of the GitHub REST API
    pub github_api_base: String,
    /// `User-Agent` header sent with every request (GitHub rejects requests without one)
    pub user_agent: String,
    /// Per-request timeout; `None` waits indefinitely
    pub timeout_secs: Option<u64>,
    pub wiki_transport: WikiTransport,
    /// Clock used to bucket wiki contribution timestamps
    pub time_basis: TimeBasis,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            user_agent: format!("{}/{}", crate::PRODUCER_NAME, crate::VERSION),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            wiki_transport: WikiTransport::default(),
            time_basis: TimeBasis::default(),
        }
    }
}

impl RetrieverConfig {
    /// Parse a TOML document
    pub fn from_toml(s: &str) -> Result<Self, RetrieveError> {
        let mut config: Self =
            toml::from_str(s).map_err(|e| RetrieveError::Config(e.to_string()))?;
        config.github_api_base = config.github_api_base.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Load a TOML file
    pub fn load_from(path: &Path) -> Result<Self, RetrieveError> {
        let content = fs::read_to_string(path).map_err(|e| {
            RetrieveError::Config(format!("reading config from {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Resolve the config file (explicit path, env, working directory) and apply
    /// environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, RetrieveError> {
        let mut config = match Self::locate(explicit)? {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::load_from(&path)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>, RetrieveError> {
        if let Some(p) = explicit {
            return Ok(Some(p.to_path_buf()));
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(RetrieveError::Config(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            return Ok(Some(pb));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        Ok(local.exists().then_some(local))
    }

    /// Apply `PUNCHCARD_*` overrides using `lookup` to read variables.
    /// A timeout of `0` disables the timeout.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), RetrieveError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = v.trim().parse().map_err(|_| {
                RetrieveError::Config(format!("{ENV_TIMEOUT_SECS} is not a number: {v}"))
            })?;
            self.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = lookup(ENV_TIME_BASIS) {
            self.time_basis = v.parse()?;
        }
        Ok(())
    }
}
