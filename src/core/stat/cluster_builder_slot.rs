use crate::base::{BaseSlot, EntryContext, StatPrepareSlot};

const PREPARE_SLOT_ORDER: u32 = 2000;

/// Installs the origin statistic node for the current caller, when the
/// context carries a caller origin. The ClusterNode itself is installed
/// together with the DefaultNode by the node selector; this slot completes
/// the per-origin dimension below it.
pub struct ClusterBuilderSlot {}

impl ClusterBuilderSlot {
    pub fn new() -> Self {
        ClusterBuilderSlot {}
    }
}

impl Default for ClusterBuilderSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseSlot for ClusterBuilderSlot {
    fn order(&self) -> u32 {
        PREPARE_SLOT_ORDER
    }
}

impl StatPrepareSlot for ClusterBuilderSlot {
    fn prepare(&self, ctx: &mut EntryContext) {
        let origin = ctx.call_ctx().read().unwrap().origin().clone();
        if origin.is_empty() {
            return;
        }
        if let Some(cur_node) = ctx.cur_node() {
            let origin_node = cur_node.cluster_node().get_or_create_origin_node(&origin);
            ctx.set_origin_node(origin_node);
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::NodeSelectorSlot;
    use super::*;
    use crate::api::{enter_context, exit_context};
    use crate::base::{ResourceType, ResourceWrapper, FloodgateInput, TrafficType};
    use std::sync::Arc;

    #[test]
    fn origin_node_installed() {
        let selector = NodeSelectorSlot::new();
        let builder = ClusterBuilderSlot::new();
        let ctx = enter_context("cluster_builder_ctx", "caller-a");
        let rw = ResourceWrapper::new(
            "cluster_builder_res".into(),
            ResourceType::Common,
            TrafficType::Outbound,
        );
        let mut entry_ctx = EntryContext::new(rw, FloodgateInput::default(), ctx);
        selector.prepare(&mut entry_ctx);
        builder.prepare(&mut entry_ctx);

        let origin_node = entry_ctx.origin_node().unwrap();
        let cluster = entry_ctx.cur_node().unwrap().cluster_node().clone();
        assert!(Arc::ptr_eq(
            &origin_node,
            &cluster.get_or_create_origin_node("caller-a")
        ));
        exit_context();
    }

    #[test]
    fn no_origin_no_node() {
        let selector = NodeSelectorSlot::new();
        let builder = ClusterBuilderSlot::new();
        let ctx = enter_context("cluster_builder_empty_origin", "");
        let rw = ResourceWrapper::new(
            "cluster_builder_res2".into(),
            ResourceType::Common,
            TrafficType::Outbound,
        );
        let mut entry_ctx = EntryContext::new(rw, FloodgateInput::default(), ctx);
        selector.prepare(&mut entry_ctx);
        builder.prepare(&mut entry_ctx);
        assert!(entry_ctx.origin_node().is_none());
        exit_context();
    }
}
