use super::{ClusterNode, DefaultNode};
use crate::base::{ResourceType, ResourceWrapper, TrafficType, TOTAL_INBOUND_RESOURCE_NAME};
use crate::{config, logging};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ClusterNodeMap = HashMap<String, Arc<ClusterNode>>;
type EntranceNodeMap = HashMap<String, Arc<DefaultNode>>;

lazy_static! {
    static ref INBOUND_NODE: Arc<ClusterNode> = Arc::new(ClusterNode::new(
        TOTAL_INBOUND_RESOURCE_NAME.into(),
        ResourceType::Common
    ));
    static ref CLUSTER_NODE_MAP: RwLock<ClusterNodeMap> = RwLock::new(ClusterNodeMap::new());
    static ref ENTRANCE_NODE_MAP: RwLock<EntranceNodeMap> = RwLock::new(EntranceNodeMap::new());
}

/// The virtual node aggregating all inbound traffic of the process.
pub fn inbound_node() -> Arc<ClusterNode> {
    INBOUND_NODE.clone()
}

pub fn get_cluster_node(res_name: &str) -> Option<Arc<ClusterNode>> {
    CLUSTER_NODE_MAP.read().unwrap().get(res_name).cloned()
}

pub fn cluster_node_list() -> Vec<Arc<ClusterNode>> {
    CLUSTER_NODE_MAP.read().unwrap().values().cloned().collect()
}

pub fn get_or_create_cluster_node(resource: &ResourceWrapper) -> Arc<ClusterNode> {
    if let Some(node) = get_cluster_node(resource.name()) {
        return node;
    }
    let mut map = CLUSTER_NODE_MAP.write().unwrap();
    map.entry(resource.name().clone())
        .or_insert_with(|| {
            Arc::new(ClusterNode::new(
                resource.name().clone(),
                *resource.classification(),
            ))
        })
        .clone()
}

/// The root node of a named context's call tree. All tasks entering the
/// same context name share one entrance node. Returns `None` when the
/// configured context cap is reached and the name is a new one.
pub fn get_or_create_entrance_node(context_name: &str) -> Option<Arc<DefaultNode>> {
    if let Some(node) = ENTRANCE_NODE_MAP.read().unwrap().get(context_name) {
        return Some(node.clone());
    }
    let mut map = ENTRANCE_NODE_MAP.write().unwrap();
    if let Some(node) = map.get(context_name) {
        return Some(node.clone());
    }
    if map.len() >= config::max_context() {
        logging::warn!(
            "[get_or_create_entrance_node] Context amount exceeds the threshold {}",
            config::max_context()
        );
        return None;
    }
    let node = Arc::new(new_entrance_node(context_name.into()));
    map.insert(context_name.into(), node.clone());
    Some(node)
}

pub(crate) fn new_entrance_node(context_name: String) -> DefaultNode {
    DefaultNode::new(ResourceWrapper::new(
        context_name,
        ResourceType::Common,
        TrafficType::Inbound,
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cluster_node_identity() {
        let res = ResourceWrapper::new(
            "node_storage_identity".into(),
            ResourceType::Common,
            TrafficType::Outbound,
        );
        let n1 = get_or_create_cluster_node(&res);
        let n2 = get_or_create_cluster_node(&res);
        assert!(Arc::ptr_eq(&n1, &n2));
        assert!(get_cluster_node("node_storage_identity").is_some());
        assert!(get_cluster_node("node_storage_missing").is_none());
    }

    #[test]
    fn entrance_node_identity() {
        let e1 = get_or_create_entrance_node("node_storage_entrance").unwrap();
        let e2 = get_or_create_entrance_node("node_storage_entrance").unwrap();
        assert!(Arc::ptr_eq(&e1, &e2));
    }
}
