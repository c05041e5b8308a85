use super::StatisticNode;
use crate::base::{
    ConcurrencyStat, MetricEvent, MetricItem, MetricItemRetriever, OccupySupport, ReadStat,
    ResourceType, StatNode, TimePredicate, WriteStat,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The process-global statistics of one resource, shared by every context
/// the resource is entered under. It additionally keeps one statistic node
/// per caller origin, created lazily on first reference.
#[derive(Debug)]
pub struct ClusterNode {
    res_name: String,
    resource_type: ResourceType,
    stat: StatisticNode,
    origin_nodes: RwLock<HashMap<String, Arc<StatisticNode>>>,
}

impl ClusterNode {
    pub fn new(res_name: String, resource_type: ResourceType) -> Self {
        ClusterNode {
            res_name,
            resource_type,
            stat: StatisticNode::new(),
            origin_nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn res_name(&self) -> &String {
        &self.res_name
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn get_or_create_origin_node(&self, origin: &str) -> Arc<StatisticNode> {
        if let Some(node) = self.origin_nodes.read().unwrap().get(origin) {
            return node.clone();
        }
        let mut nodes = self.origin_nodes.write().unwrap();
        nodes
            .entry(origin.into())
            .or_insert_with(|| Arc::new(StatisticNode::new()))
            .clone()
    }

    pub fn origin_node(&self, origin: &str) -> Option<Arc<StatisticNode>> {
        self.origin_nodes.read().unwrap().get(origin).cloned()
    }

    pub fn stat(&self) -> &StatisticNode {
        &self.stat
    }
}

impl MetricItemRetriever for ClusterNode {
    fn metrics_on_condition(&self, predicate: &TimePredicate) -> Vec<MetricItem> {
        self.stat.metrics_on_condition(predicate)
    }
}

impl ReadStat for ClusterNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.stat.qps(event)
    }

    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.stat.qps_previous(event)
    }

    fn sum(&self, event: MetricEvent) -> u64 {
        self.stat.sum(event)
    }

    fn total(&self, event: MetricEvent) -> u64 {
        self.stat.total(event)
    }

    fn min_rt(&self) -> f64 {
        self.stat.min_rt()
    }

    fn avg_rt(&self) -> f64 {
        self.stat.avg_rt()
    }
}

impl WriteStat for ClusterNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.stat.add_count(event, count);
    }
}

impl ConcurrencyStat for ClusterNode {
    fn current_concurrency(&self) -> u32 {
        self.stat.current_concurrency()
    }

    fn increase_concurrency(&self) {
        self.stat.increase_concurrency();
    }

    fn decrease_concurrency(&self) {
        self.stat.decrease_concurrency();
    }
}

impl OccupySupport for ClusterNode {
    fn try_occupy_next(&self, now: u64, acquire_count: u32, threshold: f64) -> u64 {
        self.stat.try_occupy_next(now, acquire_count, threshold)
    }

    fn waiting(&self) -> u64 {
        self.stat.waiting()
    }

    fn add_waiting_request(&self, future_time: u64, acquire_count: u32) {
        self.stat.add_waiting_request(future_time, acquire_count)
    }

    fn add_occupied_pass(&self, acquire_count: u32) {
        self.stat.add_occupied_pass(acquire_count)
    }
}

impl StatNode for ClusterNode {}
