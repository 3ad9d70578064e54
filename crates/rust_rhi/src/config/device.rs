//! # Device Configuration
//!
//! Knobs that shape a [`Device`](crate::rhi::Device): how many frames may be in flight,
//! how many command lists a frame may record, whether unloads wait for the GPU, and
//! whether backend objects get debug names.

use super::{Config, ConfigError};
use serde::{Deserialize, Serialize};

/// Device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Application name reported to the backend
    pub application_name: String,

    /// Number of frame-in-flight slots (backbuffers). Valid range 2..=8. Descriptor sets keep
    /// one replica per slot.
    pub backbuffer_count: usize,

    /// Command lists a single frame may record. Valid range 1..=64.
    pub max_command_lists: usize,

    /// Enable backend validation layers (`None` = on in debug builds)
    pub enable_validation: Option<bool>,

    /// Park unloaded resources until the frame that last used them has completed
    pub deferred_destruction: bool,

    /// Attach debug names to backend objects in `set_name`
    pub debug_names: bool,

    /// Fallback log filter used by `foundation::logging::init_with_level`
    pub log_level: String,
}

impl DeviceConfig {
    /// Create a configuration with defaults and the given application name
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    /// Set the number of frame-in-flight slots
    pub fn with_backbuffer_count(mut self, count: usize) -> Self {
        self.backbuffer_count = count;
        self
    }

    /// Set the per-frame command list capacity
    pub fn with_max_command_lists(mut self, count: usize) -> Self {
        self.max_command_lists = count;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Toggle deferred destruction of unloaded resources
    pub fn with_deferred_destruction(mut self, enabled: bool) -> Self {
        self.deferred_destruction = enabled;
        self
    }

    /// Toggle backend debug names
    pub fn with_debug_names(mut self, enabled: bool) -> Self {
        self.debug_names = enabled;
        self
    }

    /// Set the fallback log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Resolved validation setting
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if !(2..=8).contains(&self.backbuffer_count) {
            return Err(format!(
                "Backbuffer count must be between 2 and 8, got {}",
                self.backbuffer_count
            ));
        }

        if !(1..=64).contains(&self.max_command_lists) {
            return Err(format!(
                "Max command lists must be between 1 and 64, got {}",
                self.max_command_lists
            ));
        }

        Ok(())
    }

    /// Load from a `.toml` or `.ron` file and validate
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            application_name: "Rust RHI Application".to_string(),
            backbuffer_count: 3,
            max_command_lists: 16,
            enable_validation: None,
            deferred_destruction: true,
            debug_names: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config for DeviceConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DeviceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backbuffer_count, 3);
        assert!(config.deferred_destruction);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(DeviceConfig::default().with_backbuffer_count(1).validate().is_err());
        assert!(DeviceConfig::default().with_backbuffer_count(9).validate().is_err());
        assert!(DeviceConfig::default().with_max_command_lists(0).validate().is_err());
        assert!(DeviceConfig::new("").validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = DeviceConfig::from_toml_str("backbuffer_count = 2\ndebug_names = false\n").unwrap();
        assert_eq!(config.backbuffer_count, 2);
        assert!(!config.debug_names);
        assert_eq!(config.max_command_lists, 16);
    }

    #[test]
    fn test_file_round_trip_in_both_formats() {
        let dir = std::env::temp_dir();
        let config = DeviceConfig::new("round trip")
            .with_backbuffer_count(4)
            .with_validation(false)
            .with_log_level("debug");

        for ext in ["toml", "ron"] {
            let path = dir.join(format!("rust_rhi_device_config_{}.{ext}", std::process::id()));
            let path = path.to_str().unwrap();
            config.save_to_file(path).unwrap();
            let loaded = DeviceConfig::load_validated(path).unwrap();
            std::fs::remove_file(path).ok();
            assert_eq!(loaded, config);
        }
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = DeviceConfig::default().save_to_file("device.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
