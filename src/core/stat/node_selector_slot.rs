use super::DefaultNode;
use crate::base::{BaseSlot, EntryContext, StatPrepareSlot};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const PREPARE_SLOT_ORDER: u32 = 1000;

/// Installs (or looks up) the DefaultNode of the current (context,
/// resource) pair and points the entry context at it. One instance lives in
/// each per-resource slot chain, so its map is keyed by context name only:
/// the same resource entered under different contexts gets distinct tree
/// nodes, all sharing one ClusterNode.
pub struct NodeSelectorSlot {
    map: RwLock<HashMap<String, Arc<DefaultNode>>>,
}

impl NodeSelectorSlot {
    pub fn new() -> Self {
        NodeSelectorSlot {
            map: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for NodeSelectorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseSlot for NodeSelectorSlot {
    fn order(&self) -> u32 {
        PREPARE_SLOT_ORDER
    }
}

impl StatPrepareSlot for NodeSelectorSlot {
    fn prepare(&self, ctx: &mut EntryContext) {
        let ctx_name = ctx.call_ctx().read().unwrap().name().clone();
        if let Some(node) = self.map.read().unwrap().get(&ctx_name) {
            ctx.set_cur_node(node.clone());
            return;
        }
        let node = {
            let mut map = self.map.write().unwrap();
            if let Some(node) = map.get(&ctx_name) {
                node.clone()
            } else {
                let node = Arc::new(DefaultNode::new(ctx.resource().clone()));
                // hang the new node under the enclosing entry's node, or
                // under the entrance node for top-level entries
                let parent = ctx
                    .parent_node()
                    .or_else(|| ctx.call_ctx().read().unwrap().entrance_node());
                if let Some(parent) = parent {
                    parent.add_child(node.clone());
                }
                map.insert(ctx_name, node.clone());
                node
            }
        };
        ctx.set_cur_node(node);
    }
}
