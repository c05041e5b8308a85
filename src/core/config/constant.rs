use crate::base::ResourceType;

// default app settings
pub const FLOODGATE_VERSION: &str = "v1";
pub const DEFAULT_APP_NAME: &str = "unknown_service";
pub const DEFAULT_APP_TYPE: u8 = ResourceType::Common as _;
pub const APP_NAME_ENV_KEY: &str = "FLOODGATE_APP_NAME";
pub const APP_TYPE_ENV_KEY: &str = "FLOODGATE_APP_TYPE";
pub const CONF_FILE_PATH_ENV_KEY: &str = "FLOODGATE_CONFIG_FILE_PATH";
pub const CONFIG_FILENAME: &str = "USE_DEFAULT_CONFIGURATION";

// default log settings
pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const LOG_CONFIG_FILE: &str = "testdata/config/log4rs.yaml";

// warm-up settings
pub const WARM_UP_COLD_FACTOR: u32 = 3;

// cluster token server settings
pub const DEFAULT_CLUSTER_MAX_ALLOWED_QPS: f64 = 30000.0;
pub const DEFAULT_CLUSTER_EXCEED_COUNT: f64 = 1.0;
pub const DEFAULT_CLUSTER_SAMPLE_COUNT: u32 = 10;
pub const DEFAULT_CLUSTER_INTERVAL_MS: u32 = 1000;
