use serde::Deserialize;
use std::path::Path;

/// Settings for the `ringpump` producer/consumer driver.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RingPumpConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// Ring size in elements.
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
    /// Read threshold, which is also the size of every read.
    #[serde(default = "defaults::threshold")]
    pub threshold: usize,
    /// Elements per `put` from the producer.
    #[serde(default = "defaults::write_chunk")]
    pub write_chunk: usize,
    #[serde(default = "defaults::wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default = "defaults::report_interval_ms")]
    pub report_interval_ms: u64,
    /// Stop after this many seconds; run until killed when unset.
    #[serde(default)]
    pub run_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("{field} = {value} must be in 1..={capacity}")]
    OutOfRange {
        field: &'static str,
        value: usize,
        capacity: usize,
    },
}

mod defaults {
    pub fn log_level() -> String {
        "info".into()
    }

    pub fn capacity() -> usize {
        1 << 16 // 65536
    }

    pub fn threshold() -> usize {
        4096
    }

    pub fn write_chunk() -> usize {
        1024
    }

    pub fn wait_timeout_ms() -> u64 {
        100
    }

    pub fn report_interval_ms() -> u64 {
        1000
    }
}

impl Default for RingPumpConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level(),
            capacity: defaults::capacity(),
            threshold: defaults::threshold(),
            write_chunk: defaults::write_chunk(),
            wait_timeout_ms: defaults::wait_timeout_ms(),
            report_interval_ms: defaults::report_interval_ms(),
            run_secs: None,
        }
    }
}

impl RingPumpConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&toml_to_str)
    }

    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: RingPumpConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that `threshold` and `write_chunk` are usable with `capacity`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("threshold", self.threshold), ("write_chunk", self.write_chunk)] {
            if value == 0 || value > self.capacity {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    capacity: self.capacity,
                });
            }
        }
        Ok(())
    }
}
