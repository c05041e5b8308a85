use super::{get_or_create_cluster_node, ClusterNode, StatisticNode};
use crate::base::{
    ConcurrencyStat, MetricEvent, MetricItem, MetricItemRetriever, OccupySupport, ReadStat,
    ResourceWrapper, StatNode, TimePredicate, WriteStat,
};
use std::sync::{Arc, RwLock};

/// The per-(context, resource) statistics holder. Nodes of one context form
/// the call tree of that context: each node owns its children, the tree is
/// acyclic by construction. Every write is applied to this node and
/// propagated to the resource's process-global ClusterNode.
#[derive(Debug)]
pub struct DefaultNode {
    resource: ResourceWrapper,
    stat: StatisticNode,
    cluster_node: Arc<ClusterNode>,
    children: RwLock<Vec<Arc<DefaultNode>>>,
}

impl DefaultNode {
    pub fn new(resource: ResourceWrapper) -> Self {
        let cluster_node = get_or_create_cluster_node(&resource);
        DefaultNode {
            resource,
            stat: StatisticNode::new(),
            cluster_node,
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn cluster_node(&self) -> &Arc<ClusterNode> {
        &self.cluster_node
    }

    pub fn children(&self) -> Vec<Arc<DefaultNode>> {
        self.children.read().unwrap().clone()
    }

    pub fn add_child(&self, child: Arc<DefaultNode>) {
        let mut children = self.children.write().unwrap();
        if !children
            .iter()
            .any(|c| c.resource().name() == child.resource().name())
        {
            children.push(child);
        }
    }

    pub fn child(&self, res_name: &str) -> Option<Arc<DefaultNode>> {
        self.children
            .read()
            .unwrap()
            .iter()
            .find(|c| c.resource().name() == res_name)
            .cloned()
    }

    pub fn stat(&self) -> &StatisticNode {
        &self.stat
    }
}

impl MetricItemRetriever for DefaultNode {
    fn metrics_on_condition(&self, predicate: &TimePredicate) -> Vec<MetricItem> {
        self.stat.metrics_on_condition(predicate)
    }
}

impl ReadStat for DefaultNode {
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

impl WriteStat for DefaultNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.stat.add_count(event, count);
        self.cluster_node.add_count(event, count);
    }
}

impl ConcurrencyStat for DefaultNode {
    fn current_concurrency(&self) -> u32 {
        self.stat.current_concurrency()
    }

    fn increase_concurrency(&self) {
        self.stat.increase_concurrency();
        self.cluster_node.increase_concurrency();
    }

    fn decrease_concurrency(&self) {
        self.stat.decrease_concurrency();
        self.cluster_node.decrease_concurrency();
    }
}

impl OccupySupport for DefaultNode {
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

impl StatNode for DefaultNode {}
