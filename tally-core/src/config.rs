//! Configuration management
//!
//! Settings live in `<tally_dir>/settings.json`:
//! ```json
//! {
//!   "overdraftPolicy": "allow",
//!   "databaseFile": "tally.duckdb"
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_DATABASE_FILE: &str = "tally.duckdb";

/// What a transfer does when it would leave the source account negative
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdraftPolicy {
    /// Apply the arithmetic unconditionally
    #[default]
    Allow,
    /// Fail with `InsufficientFunds` and roll back
    Reject,
}

impl OverdraftPolicy {
    fn from_env_value(value: &str) -> Option<Self> {
        match value {
            "allow" | "ALLOW" | "true" | "1" | "yes" | "YES" => Some(Self::Allow),
            "reject" | "REJECT" | "false" | "0" | "no" | "NO" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    overdraft_policy: OverdraftPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database_file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Tally configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub overdraft_policy: OverdraftPolicy,
    pub database_file: String,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overdraft_policy: OverdraftPolicy::default(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the tally directory
    ///
    /// The overdraft policy can be overridden with `TALLY_OVERDRAFT`.
    pub fn load(tally_dir: &Path) -> Result<Self> {
        let raw = read_settings(tally_dir)?;

        let overdraft_policy = std::env::var("TALLY_OVERDRAFT")
            .ok()
            .and_then(|value| OverdraftPolicy::from_env_value(value.trim()))
            .unwrap_or(raw.overdraft_policy);

        let database_file = match raw.database_file.as_deref() {
            Some(file) if file.trim().is_empty() => {
                return Err(Error::Config("databaseFile must not be empty".into()))
            }
            Some(file) => file.to_string(),
            None => DEFAULT_DATABASE_FILE.to_string(),
        };

        Ok(Self {
            overdraft_policy,
            database_file,
            _raw_settings: raw,
        })
    }

    /// Save config to the tally directory.
    /// Keys this crate does not manage are written back untouched.
    pub fn save(&self, tally_dir: &Path) -> Result<()> {
        let mut settings = read_settings(tally_dir)?;
        settings.overdraft_policy = self.overdraft_policy;
        settings.database_file = if self.database_file == DEFAULT_DATABASE_FILE {
            None
        } else {
            Some(self.database_file.clone())
        };

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::create_dir_all(tally_dir)?;
        std::fs::write(tally_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }
}

fn read_settings(tally_dir: &Path) -> Result<SettingsFile> {
    let settings_path = tally_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", settings_path.display(), e)))
}
