use super::ClusterMetric;
use crate::base::FloodgateRule;
use crate::config::{DEFAULT_CLUSTER_INTERVAL_MS, DEFAULT_CLUSTER_SAMPLE_COUNT};
use crate::core::flow;
use crate::logging;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Server-side registry of cluster flow rules: flow id -> rule, namespace
/// and sliding-window metric. Connected-client counts feed the AvgLocal
/// threshold type; the transport maintaining them is not part of the core.
struct ClusterRuleEntry {
    rule: Arc<flow::Rule>,
    namespace: String,
    metric: Arc<ClusterMetric>,
}

lazy_static! {
    static ref CLUSTER_RULE_MAP: RwLock<HashMap<u64, ClusterRuleEntry>> =
        RwLock::new(HashMap::new());
    static ref CONNECTED_COUNT_MAP: RwLock<HashMap<u64, u32>> = RwLock::new(HashMap::new());
}

/// Registers the cluster-mode rules of a namespace on the embedded token
/// server, replacing that namespace's previous registration.
pub fn register_cluster_rules(namespace: &str, rules: Vec<Arc<flow::Rule>>) {
    let mut map = CLUSTER_RULE_MAP.write().unwrap();
    map.retain(|_, entry| entry.namespace != namespace);
    for rule in rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[Cluster register_cluster_rules] Ignoring invalid rule {:?}, reason: {:?}",
                rule,
                err
            );
            continue;
        }
        if !rule.cluster_mode || rule.cluster_config.flow_id == 0 {
            logging::warn!(
                "[Cluster register_cluster_rules] Ignoring non-cluster rule {:?}",
                rule
            );
            continue;
        }
        let flow_id = rule.cluster_config.flow_id;
        let metric = map
            .get(&flow_id)
            .map(|entry| Arc::clone(&entry.metric))
            .unwrap_or_else(|| {
                Arc::new(
                    ClusterMetric::new(DEFAULT_CLUSTER_SAMPLE_COUNT, DEFAULT_CLUSTER_INTERVAL_MS)
                        .unwrap(),
                )
            });
        map.insert(
            flow_id,
            ClusterRuleEntry {
                rule,
                namespace: namespace.into(),
                metric,
            },
        );
    }
}

pub fn get_cluster_rule(flow_id: u64) -> Option<Arc<flow::Rule>> {
    CLUSTER_RULE_MAP
        .read()
        .unwrap()
        .get(&flow_id)
        .map(|entry| Arc::clone(&entry.rule))
}

pub fn get_cluster_metric(flow_id: u64) -> Option<Arc<ClusterMetric>> {
    CLUSTER_RULE_MAP
        .read()
        .unwrap()
        .get(&flow_id)
        .map(|entry| Arc::clone(&entry.metric))
}

pub fn get_namespace(flow_id: u64) -> Option<String> {
    CLUSTER_RULE_MAP
        .read()
        .unwrap()
        .get(&flow_id)
        .map(|entry| entry.namespace.clone())
}

pub fn clear_cluster_rules() {
    CLUSTER_RULE_MAP.write().unwrap().clear();
}

/// The number of clients currently attached to a flow rule; maintained by
/// the transport layer, defaults to one (the local process).
pub fn connected_count(flow_id: u64) -> u32 {
    CONNECTED_COUNT_MAP
        .read()
        .unwrap()
        .get(&flow_id)
        .copied()
        .unwrap_or(1)
}

pub fn set_connected_count(flow_id: u64, count: u32) {
    CONNECTED_COUNT_MAP.write().unwrap().insert(flow_id, count);
}
