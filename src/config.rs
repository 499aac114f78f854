//! Runtime settings read from the environment (and `.env`, loaded by the
//! binary before this runs).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cache::DEFAULT_TTL;
use crate::infra::prediction::client::DEFAULT_API_URL;

pub const DATA_DIRS_VAR: &str = "ENERGY_DATA_DIRS";
pub const API_URL_VAR: &str = "PREDICTION_API_URL";
pub const CACHE_TTL_VAR: &str = "CACHE_TTL_SECS";

/// Directories searched for the CSV snapshots when none are configured.
pub static DEFAULT_DATA_DIRS: &[&str] = &[".", "..", "data", "../data", "../../data"];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dirs: Vec<PathBuf>,
    pub prediction_api_url: String,
    pub cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dirs: DEFAULT_DATA_DIRS.iter().map(PathBuf::from).collect(),
            prediction_api_url: DEFAULT_API_URL.to_string(),
            cache_ttl: DEFAULT_TTL,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from any variable source; unset or blank variables
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(dirs) = get(DATA_DIRS_VAR) {
            settings.data_dirs = env::split_paths(&dirs).collect();
        }
        if let Some(url) = get(API_URL_VAR) {
            settings.prediction_api_url = url.trim().to_string();
        }
        if let Some(ttl) = get(CACHE_TTL_VAR) {
            let secs: u64 = ttl
                .trim()
                .parse()
                .with_context(|| format!("{CACHE_TTL_VAR} must be a whole number of seconds, got {ttl:?}"))?;
            settings.cache_ttl = Duration::from_secs(secs);
        }

        Ok(settings)
    }

    /// Puts `dir` at the front of the search list.
    pub fn prepend_data_dir(&mut self, dir: PathBuf) {
        self.data_dirs.insert(0, dir);
    }
}
