//! Service configuration.
//!
//! Static settings (server binding) and pipeline settings (OCR backend,
//! limits, trigger mode, locale) are layered from an optional `config` file
//! and `IMAGETOTEXT__*` environment variables.

mod loader;
mod pipeline_config;
mod static_config;

pub use loader::{load_dynamic_config, load_static_config};
pub use pipeline_config::{DynamicConfig, LimitsConfig, OllamaConfig};
pub use static_config::StaticConfig;

use crate::error::ServiceResult;

/// Environment variable prefix for all settings
pub const ENV_PREFIX: &str = "IMAGETOTEXT";

/// Combined configuration shared by the service
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Server binding, fixed for the life of the process
    pub static_config: StaticConfig,
    dynamic: DynamicConfig,
}

impl RuntimeConfig {
    pub fn new(static_config: StaticConfig, dynamic: DynamicConfig) -> Self {
        Self {
            static_config,
            dynamic,
        }
    }

    /// Load config from the config file and environment
    pub fn load() -> ServiceResult<Self> {
        Ok(Self::new(load_static_config()?, load_dynamic_config()?))
    }

    pub fn dynamic(&self) -> &DynamicConfig {
        &self.dynamic
    }
}
