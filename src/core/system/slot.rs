use super::*;
use crate::base::{
    BaseSlot, BlockType, ConcurrencyStat, EntryContext, MetricEvent, ReadStat, RuleCheckSlot,
    Snapshot, TokenResult, TrafficType,
};
use crate::core::stat;
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 2000;

/// The global inbound guard: every inbound entry is checked against the
/// process-wide system rules using the aggregate inbound node.
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
        if *ctx.resource().traffic_type() == TrafficType::Outbound {
            return ctx.result().clone();
        }
        for rule in get_rules() {
            let (passed, msg, snapshot) = can_pass_check(&rule);
            if passed {
                continue;
            }
            ctx.set_result(TokenResult::new_blocked_with_cause(
                BlockType::SystemFlow,
                msg,
                rule.clone(),
                snapshot.unwrap(),
            ));
            return ctx.result().clone();
        }
        ctx.result().clone()
    }
}

fn can_pass_check(rule: &Arc<Rule>) -> (bool, String, Option<Arc<Snapshot>>) {
    let threshold = rule.threshold;
    let inbound = stat::inbound_node();
    let mut res = true;
    let mut msg = String::new();
    let mut snapshot = None;
    match rule.metric_type {
        MetricType::InboundQps => {
            let qps = inbound.qps(MetricEvent::Pass);
            res = qps < threshold;
            if !res {
                msg = "system qps check blocked".into();
                snapshot = Some(Arc::new(qps) as Arc<Snapshot>);
            }
        }
        MetricType::Concurrency => {
            let n = inbound.current_concurrency() as f64;
            res = n < threshold;
            if !res {
                msg = "system concurrency check blocked".into();
                snapshot = Some(Arc::new(n) as Arc<Snapshot>);
            }
        }
        MetricType::AvgRt => {
            let rt = inbound.avg_rt();
            res = rt < threshold;
            if !res {
                msg = "system avg rt check blocked".into();
                snapshot = Some(Arc::new(rt) as Arc<Snapshot>);
            }
        }
    }
    (res, msg, snapshot)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::{enter_context, exit_context};
    use crate::base::{ResourceType, ResourceWrapper, FloodgateInput};

    fn entry_ctx(res_name: &str, traffic: TrafficType) -> EntryContext {
        let ctx = enter_context(&format!("{}_ctx", res_name), "");
        let rw = ResourceWrapper::new(res_name.into(), ResourceType::Common, traffic);
        let entry_ctx = EntryContext::new(rw, FloodgateInput::default(), ctx);
        exit_context();
        entry_ctx
    }

    #[test]
    fn outbound_traffic_skipped() {
        let _guard = crate::core::test_lock::guard();
        clear_rules();
        load_rules(vec![Arc::new(Rule {
            metric_type: MetricType::Concurrency,
            threshold: 0.0,
            ..Default::default()
        })]);
        let slot = Slot {};
        let mut ctx = entry_ctx("system_slot_outbound", TrafficType::Outbound);
        assert!(!slot.check(&mut ctx).is_blocked());
        clear_rules();
    }

    #[test]
    fn empty_rules_pass() {
        let _guard = crate::core::test_lock::guard();
        clear_rules();
        let slot = Slot {};
        let mut ctx = entry_ctx("system_slot_empty", TrafficType::Inbound);
        assert!(slot.check(&mut ctx).is_pass());
    }

    #[test]
    fn concurrency_guard_blocks() {
        let _guard = crate::core::test_lock::guard();
        clear_rules();
        load_rules(vec![Arc::new(Rule {
            metric_type: MetricType::Concurrency,
            threshold: 1.0,
            ..Default::default()
        })]);
        let slot = Slot {};
        stat::inbound_node().increase_concurrency();
        let mut ctx = entry_ctx("system_slot_concurrency", TrafficType::Inbound);
        let r = slot.check(&mut ctx);
        stat::inbound_node().decrease_concurrency();
        assert!(r.is_blocked());
        assert_eq!(r.block_err().unwrap().block_type(), BlockType::SystemFlow);
        clear_rules();
    }
}
