use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    copy_pool::REPAIR_THRESHOLD,
    error::ConfigError,
    member::{DEFAULT_BORROW_LIMIT, DEFAULT_LOYALTY_INTERVAL},
};

/// Lending rules applied to new accounts and to returns
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LendingConfig {
    /// Borrow limit of a freshly registered member
    pub initial_borrow_limit: usize,
    /// Returns per loyalty step
    pub loyalty_interval: u64,
    /// Record a Return entry even when the member held nothing to return
    pub audit_unmatched_returns: bool,
    /// Size of the popularity report
    pub top_k: usize,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            initial_borrow_limit: DEFAULT_BORROW_LIMIT,
            loyalty_interval: DEFAULT_LOYALTY_INTERVAL,
            audit_unmatched_returns: false,
            top_k: 5,
        }
    }
}

/// Repair workflow tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Draws at or below this value archive the resource
    pub archive_probability: f64,
    /// Damage count past which a copy is withdrawn
    pub threshold: u32,
    /// Drop archive entries once a sweep finds them fully repaired
    pub prune_repaired_archive: bool,
    /// List each resource in the archive at most once
    pub dedupe_archive: bool,
    /// Seed for the repair draw; random if absent
    pub seed: Option<u64>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            archive_probability: 0.30,
            threshold: REPAIR_THRESHOLD,
            prune_repaired_archive: false,
            dedupe_archive: false,
            seed: None,
        }
    }
}

/// Top-level configuration, loadable from TOML
///
/// ```toml
/// [lending]
/// initial_borrow_limit = 3
///
/// [repair]
/// archive_probability = 0.3
/// seed = 7
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Lending rules
    pub lending: LendingConfig,
    /// Repair tuning
    pub repair: RepairConfig,
}

impl LibraryConfig {
    /// Parse a TOML document; missing keys take their defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Invalid` for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise the
    /// errors of [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.repair.archive_probability) {
            return Err(ConfigError::Invalid(format!(
                "repair.archive_probability must be within [0, 1], got {}",
                self.repair.archive_probability
            )));
        }
        if self.lending.loyalty_interval == 0 {
            return Err(ConfigError::Invalid("lending.loyalty_interval must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
