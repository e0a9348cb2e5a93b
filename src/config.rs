use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::view::GrowableBuffer;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "JNIBENCH_CONFIG";

/// Runtime configuration for the benchmark library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// JNI name of the instance-scoped provider class
    pub provider_class: String,

    /// JNI name of the type-scoped provider class
    pub static_provider_class: String,

    /// JNI name of the byte-backed string wrapper class
    pub utf8_string_class: String,

    /// Starting size of the caller-allocated buffer, in bytes
    pub initial_caller_capacity: usize,

    /// Upper bound the caller-allocated buffer may grow to
    pub max_caller_capacity: usize,

    /// Log one entry with the duration of every exported run
    pub trace_runs: bool,

    /// Minimum level for the structured logger
    pub log_level: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            provider_class: "com/evolvedbinary/jnibench/common/StringProvider".to_string(),
            static_provider_class: "com/evolvedbinary/jnibench/common/StringProviderStatic"
                .to_string(),
            utf8_string_class: "com/evolvedbinary/jnibench/common/UTF8String".to_string(),
            initial_caller_capacity: 100,
            max_caller_capacity: i32::MAX as usize,
            trace_runs: false,
            log_level: "info".to_string(),
        }
    }
}

impl BenchConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BenchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from the file named by `JNIBENCH_CONFIG`, or fall back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let classes = [
            ("provider_class", &self.provider_class),
            ("static_provider_class", &self.static_provider_class),
            ("utf8_string_class", &self.utf8_string_class),
        ];
        for (field, value) in classes {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    message: "class name must not be empty".to_string(),
                });
            }
        }
        if self.initial_caller_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "initial_caller_capacity",
                message: "must be positive".to_string(),
            });
        }
        if self.initial_caller_capacity > self.max_caller_capacity {
            return Err(ConfigError::Invalid {
                field: "max_caller_capacity",
                message: format!(
                    "{} is below initial_caller_capacity {}",
                    self.max_caller_capacity, self.initial_caller_capacity
                ),
            });
        }
        if self.max_caller_capacity > i32::MAX as usize {
            return Err(ConfigError::Invalid {
                field: "max_caller_capacity",
                message: "must fit a Java int".to_string(),
            });
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid {
                field: "log_level",
                message: format!("unknown level '{}'", self.log_level),
            });
        }
        Ok(())
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// Fresh buffer for one caller-allocated run.
    pub fn caller_buffer(&self) -> GrowableBuffer {
        GrowableBuffer::new(self.initial_caller_capacity, self.max_caller_capacity)
    }
}

static GLOBAL_CONFIG: Lazy<RwLock<Arc<BenchConfig>>> =
    Lazy::new(|| RwLock::new(Arc::new(BenchConfig::default())));

/// Get global benchmark configuration
pub fn global_config() -> Arc<BenchConfig> {
    GLOBAL_CONFIG.read().clone()
}

/// Replace the global configuration after validating it.
pub fn set_global_config(config: BenchConfig) -> Result<(), ConfigError> {
    config.validate()?;
    *GLOBAL_CONFIG.write() = Arc::new(config);
    Ok(())
}
