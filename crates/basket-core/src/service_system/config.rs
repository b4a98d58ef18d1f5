use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::constants::DEFAULT_ROUND_TIMEOUT_MS;
use crate::kernel::error::{Error, Result};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Scheduling policy for a [`ServiceController`](crate::ServiceController)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Length of one wait period on a round's outstanding loads
    pub round_timeout_ms: u64,
    /// Elapsed wait periods tolerated per round before giving up with a
    /// stall error. `None` keeps waiting forever.
    pub max_round_waits: Option<u32>,
    /// Reject batches that would close a dependency cycle
    pub detect_cycles: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            round_timeout_ms: DEFAULT_ROUND_TIMEOUT_MS,
            max_round_waits: None,
            detect_cycles: true,
        }
    }
}

impl ControllerConfig {
    /// Round wait period as a `Duration`, never shorter than 1 ms
    pub fn round_timeout(&self) -> Duration {
        // Zero-length periods would spin the wait loop
        Duration::from_millis(self.round_timeout_ms.max(1))
    }

    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    pub fn with_max_round_waits(mut self, waits: Option<u32>) -> Self {
        self.max_round_waits = waits;
        self
    }

    pub fn with_cycle_detection(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    /// Parse configuration text in the given format
    pub fn deserialize(data: &str, format: ConfigFormat) -> std::result::Result<Self, String> {
        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| format!("Failed to deserialize from JSON: {}", e))?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data)
                .map_err(|e| format!("Failed to deserialize from YAML: {}", e))?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| format!("Failed to deserialize from TOML: {}", e))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a string in the given format
    pub fn serialize(&self, format: ConfigFormat) -> std::result::Result<String, String> {
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize to JSON: {}", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| format!("Failed to serialize to YAML: {}", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize to TOML: {}", e)),
        }
    }

    /// Load configuration from a file, picking the format by extension
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| Error::config(path, "Unknown or unsupported config format"))?;

        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(e, "read controller config", path.to_path_buf()))?;

        let config = Self::deserialize(&data, format).map_err(|message| Error::config(path, message))?;
        log::debug!("Loaded controller config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.round_timeout_ms == 0 {
            return Err("round_timeout_ms must be greater than zero".to_string());
        }
        if self.max_round_waits == Some(0) {
            return Err("max_round_waits must be at least 1 when set".to_string());
        }
        Ok(())
    }
}
