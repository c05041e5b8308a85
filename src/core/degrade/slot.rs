use super::get_breakers_of_resource;
use crate::base::{BaseSlot, BlockType, EntryContext, FloodgateRule, RuleCheckSlot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 4000;

/// The rule-check slot applying the degrade rules of the resource.
pub struct Slot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<Slot> = Arc::new(Slot {});
}

pub fn default_slot() -> Arc<Slot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for Slot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for Slot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        let res = ctx.resource().name().clone();
        if res.is_empty() {
            return ctx.result().clone();
        }
        for breaker in get_breakers_of_resource(&res) {
            if !breaker.try_pass() {
                let concrete_rule = Arc::clone(breaker.rule());
                let rule: Arc<dyn FloodgateRule> = concrete_rule;
                ctx.set_result(TokenResult::new_blocked_with_cause(
                    BlockType::CircuitBreaking,
                    "circuit breaker check blocked".into(),
                    rule,
                    Arc::new(breaker.is_cut()),
                ));
                break;
            }
        }
        ctx.result().clone()
    }
}

#[cfg(test)]
mod test {
    use super::super::{clear_rules, load_rules, Rule, Strategy};
    use super::*;
    use crate::api::{enter_context, exit_context};
    use crate::base::{
        MetricEvent, ResourceType, ResourceWrapper, FloodgateInput, TrafficType, WriteStat,
    };
    use crate::stat::get_or_create_cluster_node;

    #[test]
    fn blocked_when_tripped() {
        let _guard = crate::core::test_lock::guard();
        clear_rules();
        let res_name = "degrade_slot_blocked";
        load_rules(vec![Arc::new(Rule {
            resource: res_name.into(),
            strategy: Strategy::ErrorCount,
            threshold: 1.0,
            retry_timeout_sec: 1,
            ..Default::default()
        })]);
        let node = get_or_create_cluster_node(&ResourceWrapper::new(
            res_name.into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        node.add_count(MetricEvent::Error, 1);

        let ctx = enter_context("degrade_slot_ctx", "");
        let rw = ResourceWrapper::new(res_name.into(), ResourceType::Common, TrafficType::Inbound);
        let mut entry_ctx = EntryContext::new(rw, FloodgateInput::default(), ctx);
        let slot = Slot {};
        let r = slot.check(&mut entry_ctx);
        assert!(r.is_blocked());
        assert_eq!(
            r.block_err().unwrap().block_type(),
            BlockType::CircuitBreaking
        );
        exit_context();
        clear_rules();
    }
}
