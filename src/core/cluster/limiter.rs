use super::{ClusterFlowEvent, ClusterMetric};
use crate::config::{DEFAULT_CLUSTER_INTERVAL_MS, DEFAULT_CLUSTER_SAMPLE_COUNT};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A plain QPS ceiling protecting the token server itself.
#[derive(Debug)]
pub struct RequestLimiter {
    metric: ClusterMetric,
    qps_allowed: f64,
}

impl RequestLimiter {
    pub fn new(qps_allowed: f64) -> Self {
        RequestLimiter {
            metric: ClusterMetric::new(DEFAULT_CLUSTER_SAMPLE_COUNT, DEFAULT_CLUSTER_INTERVAL_MS)
                .unwrap(),
            qps_allowed,
        }
    }

    pub fn try_pass(&self) -> bool {
        if self.metric.avg(ClusterFlowEvent::Pass) + 1.0 > self.qps_allowed {
            return false;
        }
        self.metric.add(ClusterFlowEvent::Pass, 1);
        true
    }

    pub fn qps_allowed(&self) -> f64 {
        self.qps_allowed
    }
}

lazy_static! {
    static ref GLOBAL_LIMITER_MAP: RwLock<HashMap<String, Arc<RequestLimiter>>> =
        RwLock::new(HashMap::new());
}

/// Install (or replace) the request limiter of a namespace.
pub fn init_request_limiter(namespace: &str, qps_allowed: f64) {
    GLOBAL_LIMITER_MAP
        .write()
        .unwrap()
        .insert(namespace.into(), Arc::new(RequestLimiter::new(qps_allowed)));
}

pub fn get_request_limiter(namespace: &str) -> Option<Arc<RequestLimiter>> {
    GLOBAL_LIMITER_MAP.read().unwrap().get(namespace).cloned()
}

/// Whether the namespace still accepts token requests. A namespace without
/// a limiter always proceeds.
pub fn allow_proceed(namespace: &str) -> bool {
    match get_request_limiter(namespace) {
        Some(limiter) => limiter.try_pass(),
        None => true,
    }
}
