//! TOML-based application configuration.
//!
//! Stores operator-tunable settings:
//! - Admin allow-list for privileged operations (injected, never hardcoded)
//! - Focus-fitness decay parameters
//! - Validation limits for sessions and pacts
//!
//! Configuration is stored at `~/.config/focuspact/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Admin allow-list configuration.
///
/// Identities listed here may perform privileged operations such as
/// defining challenges. Empty by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub allow_list: Vec<String>,
}

/// Focus-fitness (EWMA) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Per-day decay factor applied to the running score.
    #[serde(default = "default_decay")]
    pub decay: f64,
    /// Points added per completed focus session.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Trailing window length in days.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

/// Validation limits for incoming writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted session duration in seconds.
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u32,
    /// Tolerated forward clock skew for `completed_at`, in seconds.
    #[serde(default = "default_clock_skew_secs")]
    pub clock_skew_secs: u32,
    /// Maximum pact length in days.
    #[serde(default = "default_max_pact_days")]
    pub max_pact_days: u32,
    /// Maximum daily quota a pact may require.
    #[serde(default = "default_max_pomos_per_day")]
    pub max_pomos_per_day: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focuspact/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub fitness: FitnessConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

// Default functions
fn default_decay() -> f64 {
    0.976
}
fn default_weight() -> f64 {
    1.0
}
fn default_window_days() -> u32 {
    90
}
fn default_max_session_secs() -> u32 {
    4 * 3600
}
fn default_clock_skew_secs() -> u32 {
    300
}
fn default_max_pact_days() -> u32 {
    90
}
fn default_max_pomos_per_day() -> u32 {
    20
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            decay: default_decay(),
            weight: default_weight(),
            window_days: default_window_days(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_session_secs: default_max_session_secs(),
            clock_skew_secs: default_clock_skew_secs(),
            max_pact_days: default_max_pact_days(),
            max_pomos_per_day: default_max_pomos_per_day(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, std::io::Error> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default, writing the default back so the
    /// operator has a file to edit.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/focuspact"),
            message: e.to_string(),
        })?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path().map_err(|e| ConfigError::SaveFailed {
            path: PathBuf::from("~/.config/focuspact"),
            message: e.to_string(),
        })?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Whether the given identity reference is on the admin allow-list.
    pub fn is_admin(&self, identity_ref: &str) -> bool {
        self.admin.allow_list.iter().any(|a| a == identity_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.fitness.decay, 0.976);
        assert_eq!(parsed.fitness.window_days, 90);
        assert_eq!(parsed.limits.max_session_secs, 14400);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[admin]\nallow_list = [\"ops@example.com\"]\n").unwrap();
        assert!(parsed.is_admin("ops@example.com"));
        assert!(!parsed.is_admin("someone@example.com"));
        assert_eq!(parsed.limits.max_pact_days, 90);
        assert_eq!(parsed.fitness.weight, 1.0);
    }

    #[test]
    fn empty_allow_list_admits_nobody() {
        let cfg = Config::default();
        assert!(!cfg.is_admin(""));
        assert!(!cfg.is_admin("anyone"));
    }
}
