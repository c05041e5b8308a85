//! Per-second metric rows exported from the minute-grained sliding window.

/// One aggregated row of resource metrics for a single statistic bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricItem {
    pub timestamp: u64,
    pub pass_qps: u64,
    pub block_qps: u64,
    pub complete_qps: u64,
    pub error_qps: u64,
    pub occupied_pass_qps: u64,
    pub avg_rt: u64,
    pub concurrency: u32,
}

pub type TimePredicate = dyn Fn(u64) -> bool;

pub trait MetricItemRetriever: Send + Sync {
    fn metrics_on_condition(&self, predicate: &TimePredicate) -> Vec<MetricItem>;
}
