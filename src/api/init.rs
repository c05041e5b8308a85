//! Initialization of the runtime environment:
//! 1. override the global config, manually, from a YAML file or from env
//!    variables
//! 2. initialize the global logger
//! 3. start the cached time ticker when configured

use crate::core::config;
use crate::core::config::ConfigEntity;
use crate::{utils, Result};

/// `init_default` initializes the library using the configuration from the
/// system environment and the default values.
#[inline]
pub fn init_default() -> Result<()> {
    init_floodgate(&mut String::new())
}

/// `init_with_config` initializes the library using the given config.
#[inline]
pub fn init_with_config(config_entity: ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    config::override_config_from_env_and_init_log()?;
    init_core_components()
}

/// `init_with_config_file` loads the general configuration from the given
/// YAML file and initializes the library.
#[inline]
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    init_floodgate(config_path)
}

#[inline]
fn init_floodgate(config_path: &mut String) -> Result<()> {
    // Initialize the general config and the logging module.
    config::init_config_with_yaml(config_path)?;
    init_core_components()
}

// `init_core_components` initializes the core components with the global
// config
#[inline]
fn init_core_components() -> Result<()> {
    if config::use_cache_time() {
        utils::start_time_ticker();
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn init_default_ok() {
        init_default().unwrap();
    }

    #[test]
    fn init_rejects_invalid_entity() {
        let mut entity = ConfigEntity::new();
        entity.config.stat.sample_count = 7;
        assert!(init_with_config(entity).is_err());
    }
}
