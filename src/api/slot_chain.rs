use crate::base::SlotChain;
use crate::core::{authority, degrade, flow, log, stat, system};
use crate::{config, logging};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref CHAIN_MAP: RwLock<HashMap<String, Arc<SlotChain>>> = RwLock::new(HashMap::new());
}

/// Builds the canonical slot chain of one resource. The prepare slots are
/// chain-local (they carry per-resource node state); the rule-check and
/// statistic slots are shared singletons.
pub fn new_slot_chain() -> Arc<SlotChain> {
    let mut sc = SlotChain::new();

    sc.add_stat_prepare_slot(Arc::new(stat::NodeSelectorSlot::new())); // 1000
    sc.add_stat_prepare_slot(Arc::new(stat::ClusterBuilderSlot::new())); // 2000

    sc.add_rule_check_slot(authority::default_slot()); // 1000
    sc.add_rule_check_slot(system::default_slot()); // 2000
    sc.add_rule_check_slot(flow::default_slot()); // 3000
    sc.add_rule_check_slot(degrade::default_slot()); // 4000

    sc.add_stat_slot(stat::default_statistic_slot()); // 1000
    sc.add_stat_slot(log::default_log_slot()); // 2000
    Arc::new(sc)
}

/// The slot chain of the named resource, created on first use. `None`
/// once the configured chain cap is reached: such entries bypass every
/// check instead of failing.
pub fn get_or_create_chain(res_name: &str) -> Option<Arc<SlotChain>> {
    if let Some(chain) = CHAIN_MAP.read().unwrap().get(res_name) {
        return Some(chain.clone());
    }
    let mut map = CHAIN_MAP.write().unwrap();
    if let Some(chain) = map.get(res_name) {
        return Some(chain.clone());
    }
    if map.len() >= config::max_slot_chain() {
        logging::FREQUENT_ERROR_ONCE.call_once(|| {
            logging::warn!(
                "[get_or_create_chain] Slot chain amount exceeds the threshold {}, new resources pass through",
                config::max_slot_chain()
            );
        });
        return None;
    }
    let chain = new_slot_chain();
    map.insert(res_name.into(), chain.clone());
    Some(chain)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chain_identity_per_resource() {
        let c1 = get_or_create_chain("api_chain_identity").unwrap();
        let c2 = get_or_create_chain("api_chain_identity").unwrap();
        assert!(Arc::ptr_eq(&c1, &c2));
        let c3 = get_or_create_chain("api_chain_identity_other").unwrap();
        assert!(!Arc::ptr_eq(&c1, &c3));
    }
}
