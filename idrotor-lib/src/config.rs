//! Rotation configuration.

use crate::generator::DEFAULT_MAX_ATTEMPTS;
use crate::interception::EntryPointKind;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Configuration for the identifier store and interception layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotorConfig {
    /// Preference key the current identifier is persisted under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Whether to load/save the identifier through the preference store.
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Draws allowed per generation before reporting entropy failure.
    #[serde(default = "default_max_attempts")]
    pub max_generation_attempts: u32,

    /// Native entry points to redirect.
    #[serde(default = "default_entry_points")]
    pub entry_points: Vec<EntryPointKind>,
}

fn default_storage_key() -> String {
    "idrotor.customDeviceID".to_string()
}

fn default_persist() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_entry_points() -> Vec<EntryPointKind> {
    EntryPointKind::ALL.to_vec()
}

impl Default for RotorConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            persist: default_persist(),
            max_generation_attempts: default_max_attempts(),
            entry_points: default_entry_points(),
        }
    }
}

impl RotorConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Set the preference key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Enable or disable persistence.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Restrict interception to the given entry points.
    pub fn with_entry_points(mut self, entry_points: Vec<EntryPointKind>) -> Self {
        self.entry_points = entry_points;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RotorConfig::default();
        assert!(config.persist);
        assert_eq!(config.max_generation_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.entry_points, EntryPointKind::ALL.to_vec());
    }

    #[test]
    fn test_config_partial_json() {
        let config = RotorConfig::from_json(r#"{"persist": false}"#).unwrap();
        assert!(!config.persist);
        assert_eq!(config.storage_key, "idrotor.customDeviceID");
    }

    #[test]
    fn test_config_entry_points_json() {
        let config =
            RotorConfig::from_json(r#"{"entry_points": ["vendor_identifier"]}"#).unwrap();
        assert_eq!(config.entry_points, vec![EntryPointKind::VendorIdentifier]);

        let json = config.to_json().unwrap();
        assert_eq!(RotorConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_config_rejects_garbage() {
        assert!(RotorConfig::from_json("{").is_err());
        assert!(RotorConfig::from_json(r#"{"entry_points": ["nope"]}"#).is_err());
    }
}
