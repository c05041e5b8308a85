use super::{constant::*, ConfigEntity};
use crate::base::ResourceType;
use crate::{logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<ConfigEntity> = RwLock::new(ConfigEntity::new());
}

pub fn reset_global_config(entity: ConfigEntity) {
    let mut cfg = GLOBAL_CONFIG.write().unwrap();
    *cfg = entity;
}

// init_config_with_yaml loads the general configuration from the YAML file
// under the provided path.
pub fn init_config_with_yaml(config_path: &mut String) -> Result<()> {
    // Initialize the general config and the logging module.
    apply_yaml_config_file(config_path)?;
    override_config_from_env_and_init_log()?;
    Ok(())
}

// apply_yaml_config_file loads the general configuration from the given
// YAML file.
fn apply_yaml_config_file(config_path: &mut String) -> Result<()> {
    // Priority: system environment > YAML file > default config
    if utils::is_blank(config_path) {
        // If the config file path is absent, try to resolve it from the
        // system env.
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    load_global_config_from_yaml_file(config_path)?;
    Ok(())
}

fn load_global_config_from_yaml_file(path_str: &String) -> Result<()> {
    let path = Path::new(path_str);
    if path_str == CONFIG_FILENAME {
        // use the default global config
        return Ok(());
    }
    if !path.exists() {
        return Err(Error::msg("Floodgate YAML configuration file does not exist!"));
    }
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!("[Config] Resolving config from file, file {}", path_str);
    reset_global_config(entity);
    Ok(())
}

pub fn override_config_from_env_and_init_log() -> Result<()> {
    let app_name = env::var(APP_NAME_ENV_KEY).unwrap_or_default();
    let app_type: ResourceType = env::var(APP_TYPE_ENV_KEY)
        .unwrap_or(format!("{}", DEFAULT_APP_TYPE))
        .parse::<u8>()
        .unwrap_or(DEFAULT_APP_TYPE)
        .into();

    {
        let mut cfg = GLOBAL_CONFIG.write().unwrap();
        if !utils::is_blank(&app_name) {
            cfg.config.app.app_name = app_name;
        }
        cfg.config.app.app_type = app_type;
        cfg.check()?;
    }

    // init logging with the resolved config
    crate::logging::logger_init(Some(log_config_file()));
    logging::info!(
        "[Config] Print effective global config, config {}",
        *GLOBAL_CONFIG.read().unwrap()
    );
    Ok(())
}

pub fn app_name() -> String {
    GLOBAL_CONFIG.read().unwrap().config.app.app_name.clone()
}

pub fn app_type() -> ResourceType {
    GLOBAL_CONFIG.read().unwrap().config.app.app_type
}

pub fn log_config_file() -> String {
    GLOBAL_CONFIG.read().unwrap().config.log.config_file.clone()
}

/// The master switch: when false, every check passes.
pub fn enabled() -> bool {
    GLOBAL_CONFIG.read().unwrap().config.enabled
}

pub fn metric_stat_sample_count() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.sample_count
}

pub fn metric_stat_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.interval_ms
}

pub fn statistic_max_rt() -> u64 {
    GLOBAL_CONFIG.read().unwrap().config.stat.max_rt_ms
}

pub fn occupy_timeout_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.occupy.timeout_ms
}

pub fn occupy_max_ratio() -> f64 {
    GLOBAL_CONFIG.read().unwrap().config.occupy.max_ratio
}

pub fn max_slot_chain() -> usize {
    GLOBAL_CONFIG.read().unwrap().config.pipeline.max_slot_chain
}

pub fn max_context() -> usize {
    GLOBAL_CONFIG.read().unwrap().config.pipeline.max_context
}

pub fn max_context_name_len() -> usize {
    GLOBAL_CONFIG
        .read()
        .unwrap()
        .config
        .pipeline
        .max_context_name_len
}

pub fn use_cache_time() -> bool {
    GLOBAL_CONFIG.read().unwrap().config.use_cache_time
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        assert!(enabled());
        assert_eq!(metric_stat_sample_count(), 2);
        assert_eq!(metric_stat_interval_ms(), 1000);
        assert_eq!(statistic_max_rt(), 4900);
        assert_eq!(occupy_timeout_ms(), 500);
        assert!((occupy_max_ratio() - 1.0).abs() < f64::EPSILON);
        assert_eq!(max_slot_chain(), 6000);
        assert_eq!(max_context(), 2000);
        assert_eq!(max_context_name_len(), 2000);
    }
}
