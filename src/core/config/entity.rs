use super::constant::*;
use crate::base::{
    check_validity_for_statistic, ResourceType, DEFAULT_INTERVAL_MS, DEFAULT_MAX_CONTEXT,
    DEFAULT_MAX_CONTEXT_NAME_LEN, DEFAULT_MAX_SLOT_CHAIN, DEFAULT_OCCUPY_MAX_RATIO,
    DEFAULT_OCCUPY_TIMEOUT_MS, DEFAULT_SAMPLE_COUNT, DEFAULT_STATISTIC_MAX_RT,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug)]
pub struct AppConfig {
    // app_name represents the name of the current running service.
    pub app_name: String,
    // app_type indicates the resource type of the service
    // (e.g. web service, API gateway).
    pub app_type: ResourceType,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: DEFAULT_APP_NAME.into(),
            app_type: DEFAULT_APP_TYPE.into(),
        }
    }
}

// LogConfig represents the configuration of logging.
#[derive(Serialize, Deserialize, Debug)]
pub struct LogConfig {
    pub config_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            config_file: LOG_CONFIG_FILE.into(),
        }
    }
}

// StatConfig represents the configuration items related to statistics.
#[derive(Serialize, Deserialize, Debug)]
pub struct StatConfig {
    // sample_count and interval_ms define the second-grained sliding window
    // of every statistic node
    pub sample_count: u32,
    pub interval_ms: u32,
    // the clamp for recorded response times, in milliseconds
    pub max_rt_ms: u64,
}

impl Default for StatConfig {
    fn default() -> Self {
        StatConfig {
            sample_count: DEFAULT_SAMPLE_COUNT,
            interval_ms: DEFAULT_INTERVAL_MS,
            max_rt_ms: DEFAULT_STATISTIC_MAX_RT,
        }
    }
}

// OccupyConfig governs priority borrowing of future statistic windows.
#[derive(Serialize, Deserialize, Debug)]
pub struct OccupyConfig {
    // the longest sleep a prioritized request may take for a future window
    pub timeout_ms: u32,
    // the max fraction of a cluster threshold borrowable via priority
    pub max_ratio: f64,
}

impl Default for OccupyConfig {
    fn default() -> Self {
        OccupyConfig {
            timeout_ms: DEFAULT_OCCUPY_TIMEOUT_MS,
            max_ratio: DEFAULT_OCCUPY_MAX_RATIO,
        }
    }
}

// PipelineConfig caps the global registries of the decision pipeline.
#[derive(Serialize, Deserialize, Debug)]
pub struct PipelineConfig {
    pub max_slot_chain: usize,
    pub max_context: usize,
    pub max_context_name_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_slot_chain: DEFAULT_MAX_SLOT_CHAIN,
            max_context: DEFAULT_MAX_CONTEXT,
            max_context_name_len: DEFAULT_MAX_CONTEXT_NAME_LEN,
        }
    }
}

// FloodgateConfig represents the general configuration.
#[derive(Serialize, Deserialize, Debug)]
pub struct FloodgateConfig {
    // enabled is the master switch: when false, every check passes.
    pub enabled: bool,
    pub app: AppConfig,
    pub log: LogConfig,
    pub stat: StatConfig,
    pub occupy: OccupyConfig,
    pub pipeline: PipelineConfig,
    // use_cache_time indicates whether to cache time(ms)
    pub use_cache_time: bool,
}

impl Default for FloodgateConfig {
    fn default() -> Self {
        FloodgateConfig {
            enabled: true,
            app: AppConfig::default(),
            log: LogConfig::default(),
            stat: StatConfig::default(),
            occupy: OccupyConfig::default(),
            pipeline: PipelineConfig::default(),
            use_cache_time: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct ConfigEntity {
    pub version: String,
    pub config: FloodgateConfig,
}

impl ConfigEntity {
    pub fn new() -> Self {
        ConfigEntity {
            version: FLOODGATE_VERSION.into(),
            config: FloodgateConfig::default(),
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::msg("empty version"));
        }
        if self.config.app.app_name.is_empty() {
            return Err(Error::msg("app.app_name cannot be empty"));
        }
        check_validity_for_statistic(self.config.stat.sample_count, self.config.stat.interval_ms)?;
        if self.config.stat.max_rt_ms == 0 {
            return Err(Error::msg("stat.max_rt_ms should be positive"));
        }
        if !(0.0..=1.0).contains(&self.config.occupy.max_ratio) {
            return Err(Error::msg("occupy.max_ratio should be in [0.0, 1.0]"));
        }
        if self.config.pipeline.max_slot_chain == 0 || self.config.pipeline.max_context == 0 {
            return Err(Error::msg("pipeline caps should be positive"));
        }
        Ok(())
    }
}

impl fmt::Display for ConfigEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
