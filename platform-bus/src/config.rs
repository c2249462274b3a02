//! Bus configuration

use pbus_api::error::{invalid_argument, Result};

/// Platform bus configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct BusConfig {
    /// Maximum number of devices the catalog accepts
    pub max_devices: usize,
    /// Number of DMA scopes the built-in IOMMU can mint
    pub bti_capacity: usize,
    /// Name prefix of the per-bus I2C worker threads
    pub i2c_thread_prefix: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_devices: 256,
            bti_capacity: 1024,
            i2c_thread_prefix: "pbus-i2c".to_string(),
        }
    }
}

impl BusConfig {
    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = max_devices;
        self
    }

    pub fn with_bti_capacity(mut self, bti_capacity: usize) -> Self {
        self.bti_capacity = bti_capacity;
        self
    }

    pub fn with_i2c_thread_prefix(mut self, prefix: &str) -> Self {
        self.i2c_thread_prefix = prefix.to_string();
        self
    }

    /// Rejects configurations the bus cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_devices == 0 {
            return Err(invalid_argument("max_devices must be non-zero"));
        }
        if self.bti_capacity == 0 {
            return Err(invalid_argument("bti_capacity must be non-zero"));
        }
        if self.i2c_thread_prefix.is_empty() {
            return Err(invalid_argument("i2c_thread_prefix must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BusConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_devices, 256);
    }

    #[test]
    fn test_invalid_config() {
        assert!(BusConfig::default().with_max_devices(0).validate().is_err());
        assert!(BusConfig::default().with_bti_capacity(0).validate().is_err());
        assert!(BusConfig::default().with_i2c_thread_prefix("").validate().is_err());
    }
}
