/// Resource name of the virtual node aggregating all inbound traffic.
pub const TOTAL_INBOUND_RESOURCE_NAME: &str = "__total_inbound_traffic__";

/// Name of the context implicitly entered when an entry is built outside of
/// any user-defined context.
pub const DEFAULT_CONTEXT_NAME: &str = "floodgate_default_context";

/// Origin values with special meaning in flow rules.
pub const LIMIT_ORIGIN_DEFAULT: &str = "default";
pub const LIMIT_ORIGIN_OTHER: &str = "other";

// second-grained statistic geometry
pub const DEFAULT_SAMPLE_COUNT: u32 = 2;
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

// minute-grained statistic geometry
pub const MINUTE_SAMPLE_COUNT: u32 = 60;
pub const MINUTE_INTERVAL_MS: u32 = 60_000;

/// Clamp for recorded response times.
pub const DEFAULT_STATISTIC_MAX_RT: u64 = 4900;

/// Max wait a prioritized request may sleep to occupy a future window.
pub const DEFAULT_OCCUPY_TIMEOUT_MS: u32 = 500;
/// Max fraction of the threshold borrowable via priority in cluster mode.
pub const DEFAULT_OCCUPY_MAX_RATIO: f64 = 1.0;

/// Cap on distinct per-resource slot chains; beyond it entries pass through.
pub const DEFAULT_MAX_SLOT_CHAIN: usize = 6000;
/// Cap on distinct context names.
pub const DEFAULT_MAX_CONTEXT: usize = 2000;
/// Cap on the length of a single context name.
pub const DEFAULT_MAX_CONTEXT_NAME_LEN: usize = 2000;

pub const SLOT_INIT: usize = 8;
