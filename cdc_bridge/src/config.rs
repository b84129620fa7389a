//! TOML configuration for the bridge, its clocks and the reference peripheral.
//!
//! ```toml
//! [bridge]
//! request_depth_log2 = 2
//! response_depth_log2 = 1
//! address_width = 16
//! data_width = 32
//! write_completion = "acknowledged"
//!
//! [clock]
//! fast_period = 1
//! slow_period = 3
//! jitter = 2
//! seed = 7
//!
//! [peripheral]
//! wait_states = { random = { max = 5 } }
//! ```

use std::path::{Path, PathBuf};

use cdc_fifo::MAX_DEPTH_LOG2;
use serde::Deserialize;
use thiserror::Error;

use crate::packet::BusWidth;
use crate::peripheral::WaitStates;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{name} must be at most {max} (got {value})")]
    DepthOutOfRange {
        name: &'static str,
        value: u32,
        max: u32,
    },
    #[error("{name} must be between 1 and 32 bits (got {value})")]
    WidthOutOfRange { name: &'static str, value: u32 },
    #[error("{name} must be non-zero")]
    ZeroPeriod { name: &'static str },
}

/// When a write is reported complete to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteCompletion {
    /// Complete once the write is in the request queue.
    #[default]
    Posted,
    /// Complete once the peripheral has accepted it and the acknowledgement
    /// has come back through the response queue.
    Acknowledged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Request queue holds `2^request_depth_log2` packets.
    pub request_depth_log2: u32,
    /// Response queue holds `2^response_depth_log2` packets.
    pub response_depth_log2: u32,
    pub address_width: u32,
    pub data_width: u32,
    pub write_completion: WriteCompletion,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_depth_log2: 2,
            response_depth_log2: 1,
            address_width: 32,
            data_width: 32,
            write_completion: WriteCompletion::Posted,
        }
    }
}

impl BridgeConfig {
    pub fn bus_width(&self) -> BusWidth {
        BusWidth::new(self.address_width, self.data_width)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("request_depth_log2", self.request_depth_log2),
            ("response_depth_log2", self.response_depth_log2),
        ] {
            if value > MAX_DEPTH_LOG2 {
                return Err(ConfigError::DepthOutOfRange {
                    name,
                    value,
                    max: MAX_DEPTH_LOG2,
                });
            }
        }
        for (name, value) in [
            ("address_width", self.address_width),
            ("data_width", self.data_width),
        ] {
            if !(1..=32).contains(&value) {
                return Err(ConfigError::WidthOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// Periods are in abstract time units shared by both clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    pub fast_period: u64,
    pub slow_period: u64,
    /// Time of the first slow edge.
    pub slow_phase: u64,
    /// Each slow period is stretched by a random 0..=jitter units.
    pub jitter: u64,
    pub seed: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fast_period: 1,
            slow_period: 3,
            slow_phase: 0,
            jitter: 0,
            seed: 0,
        }
    }
}

impl ClockConfig {
    pub fn ratio(fast_period: u64, slow_period: u64) -> Self {
        Self {
            fast_period,
            slow_period,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_period == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: "fast_period",
            });
        }
        if self.slow_period == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: "slow_period",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeripheralConfig {
    pub wait_states: WaitStates,
    pub seed: u64,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            wait_states: WaitStates::Fixed(0),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub clock: ClockConfig,
    pub peripheral: PeripheralConfig,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bridge.validate()?;
        self.clock.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bridge.write_completion, WriteCompletion::Posted);
    }

    #[test]
    fn test_full_document() {
        let config = Config::from_toml_str(
            r#"
            [bridge]
            request_depth_log2 = 3
            response_depth_log2 = 0
            address_width = 16
            data_width = 8
            write_completion = "acknowledged"

            [clock]
            fast_period = 2
            slow_period = 5
            slow_phase = 1
            jitter = 3
            seed = 99

            [peripheral]
            wait_states = { random = { max = 4 } }
            seed = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.bridge.request_depth_log2, 3);
        assert_eq!(config.bridge.response_depth_log2, 0);
        assert_eq!(config.bridge.write_completion, WriteCompletion::Acknowledged);
        assert_eq!(config.bridge.bus_width(), BusWidth::new(16, 8));
        assert_eq!(config.clock.slow_period, 5);
        assert_eq!(config.clock.jitter, 3);
        assert_eq!(config.peripheral.wait_states, WaitStates::Random { max: 4 });
    }

    #[test]
    fn test_fixed_wait_states() {
        let config = Config::from_toml_str("[peripheral]\nwait_states = { fixed = 5 }\n").unwrap();
        assert_eq!(config.peripheral.wait_states, WaitStates::Fixed(5));
    }

    #[test]
    fn test_rejects_deep_queue() {
        let err = Config::from_toml_str("[bridge]\nrequest_depth_log2 = 40\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DepthOutOfRange {
                name: "request_depth_log2",
                value: 40,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_bad_width() {
        let err = Config::from_toml_str("[bridge]\ndata_width = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::WidthOutOfRange { name: "data_width", .. }));
        let err = Config::from_toml_str("[bridge]\naddress_width = 33\n").unwrap_err();
        assert!(matches!(err, ConfigError::WidthOutOfRange { name: "address_width", .. }));
    }

    #[test]
    fn test_rejects_zero_period() {
        let err = Config::from_toml_str("[clock]\nslow_period = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPeriod { name: "slow_period" }));
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(matches!(
            Config::from_toml_str("[bridge]\npipelined = true\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/bridge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
