use super::{get_rules_of_resource, Strategy};
use crate::base::{BaseSlot, BlockType, EntryContext, RuleCheckSlot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 1000;

/// Matches the calling origin against the resource's allow/deny lists.
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
        let origin = ctx.call_ctx().read().unwrap().origin().clone();
        for rule in get_rules_of_resource(&res) {
            let contains = rule.contains_origin(&origin);
            let passed = match rule.strategy {
                Strategy::AllowList => contains,
                Strategy::DenyList => !contains,
            };
            if !passed {
                ctx.set_result(TokenResult::new_blocked_with_cause(
                    BlockType::Authority,
                    "authority check blocked".into(),
                    rule.clone(),
                    Arc::new(origin.clone()),
                ));
                break;
            }
        }
        ctx.result().clone()
    }
}

#[cfg(test)]
mod test {
    use super::super::{clear_rules, load_rules, Rule};
    use super::*;
    use crate::api::{enter_context, exit_context};
    use crate::base::{ResourceType, ResourceWrapper, FloodgateInput, TrafficType};

    fn entry_ctx(ctx_name: &str, res_name: &str, origin: &str) -> EntryContext {
        let ctx = enter_context(ctx_name, origin);
        let rw = ResourceWrapper::new(res_name.into(), ResourceType::Common, TrafficType::Inbound);
        let entry_ctx = EntryContext::new(rw, FloodgateInput::default(), ctx);
        exit_context();
        entry_ctx
    }

    #[test]
    fn allow_list() {
        let _guard = crate::core::test_lock::guard();
        clear_rules();
        let res = "authority_slot_allow";
        load_rules(vec![Arc::new(Rule {
            resource: res.into(),
            strategy: Strategy::AllowList,
            origins: vec!["caller-a".into()],
            ..Default::default()
        })]);
        let slot = Slot {};

        let mut allowed = entry_ctx("authority_allow_ok", res, "caller-a");
        assert!(!slot.check(&mut allowed).is_blocked());

        let mut denied = entry_ctx("authority_allow_no", res, "caller-b");
        let r = slot.check(&mut denied);
        assert!(r.is_blocked());
        assert_eq!(r.block_err().unwrap().block_type(), BlockType::Authority);
        clear_rules();
    }

    #[test]
    fn deny_list() {
        let _guard = crate::core::test_lock::guard();
        clear_rules();
        let res = "authority_slot_deny";
        load_rules(vec![Arc::new(Rule {
            resource: res.into(),
            strategy: Strategy::DenyList,
            origins: vec!["caller-a".into()],
            ..Default::default()
        })]);
        let slot = Slot {};

        let mut denied = entry_ctx("authority_deny_no", res, "caller-a");
        assert!(slot.check(&mut denied).is_blocked());

        let mut allowed = entry_ctx("authority_deny_ok", res, "caller-b");
        assert!(!slot.check(&mut allowed).is_blocked());
        clear_rules();
    }
}
