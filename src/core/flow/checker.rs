//! Node selection and the local/cluster dispatch of one flow rule check.

use super::{is_origin_targeted, Controller, RelationStrategy, Rule};
use crate::base::{
    BlockType, EntryContext, FloodgateRule, StatNode, TokenResult, LIMIT_ORIGIN_DEFAULT,
    LIMIT_ORIGIN_OTHER,
};
use crate::core::cluster;
use crate::core::cluster::TokenStatus;
use crate::core::stat;
use crate::utils;
use std::sync::Arc;

pub fn can_pass_check(tc: &Arc<Controller>, ctx: &EntryContext) -> TokenResult {
    let rule = tc.rule();
    if rule.cluster_mode {
        return pass_cluster_check(tc, rule, ctx);
    }
    pass_local_check(tc, rule, ctx)
}

fn pass_local_check(tc: &Arc<Controller>, rule: &Arc<Rule>, ctx: &EntryContext) -> TokenResult {
    match select_node_by_origin_and_strategy(rule, ctx) {
        // no statistics imply the rule does not watch this call
        None => TokenResult::new_pass(),
        Some(node) => {
            tc.perform_checking(node, ctx.input().batch_count(), ctx.input().prioritized())
        }
    }
}

fn filter_origin(origin: &str) -> bool {
    // an origin cannot be `default` or `other`
    !origin.is_empty() && origin != LIMIT_ORIGIN_DEFAULT && origin != LIMIT_ORIGIN_OTHER
}

fn select_reference_node(rule: &Arc<Rule>, ctx: &EntryContext) -> Option<Arc<dyn StatNode>> {
    match rule.relation_strategy {
        RelationStrategy::Associated => stat::get_cluster_node(&rule.ref_resource)
            .map(|node| node as Arc<dyn StatNode>),
        RelationStrategy::Chain => {
            let ctx_name = ctx.call_ctx().read().unwrap().name().clone();
            if ctx_name == rule.ref_resource {
                ctx.cur_node().map(|node| node as Arc<dyn StatNode>)
            } else {
                None
            }
        }
        RelationStrategy::Current => None,
    }
}

/// Pick the statistics node implied by the rule's limited origin and its
/// relation strategy. `None` means the rule does not apply to this call.
pub(crate) fn select_node_by_origin_and_strategy(
    rule: &Arc<Rule>,
    ctx: &EntryContext,
) -> Option<Arc<dyn StatNode>> {
    let origin = ctx.call_ctx().read().unwrap().origin().clone();
    let limit_origin = &rule.limit_origin;
    if *limit_origin == origin && filter_origin(&origin) {
        // the rule targets exactly this caller
        if rule.relation_strategy == RelationStrategy::Current {
            return ctx.origin_node().map(|node| node as Arc<dyn StatNode>);
        }
        select_reference_node(rule, ctx)
    } else if limit_origin == LIMIT_ORIGIN_DEFAULT {
        // the rule targets every caller: use the resource-global statistics
        if rule.relation_strategy == RelationStrategy::Current {
            return ctx
                .cur_node()
                .map(|node| node.cluster_node().clone() as Arc<dyn StatNode>);
        }
        select_reference_node(rule, ctx)
    } else if limit_origin == LIMIT_ORIGIN_OTHER && !is_origin_targeted(&origin, &rule.resource) {
        // the rule targets callers no other rule singles out
        if rule.relation_strategy == RelationStrategy::Current {
            return ctx.origin_node().map(|node| node as Arc<dyn StatNode>);
        }
        select_reference_node(rule, ctx)
    } else {
        None
    }
}

fn pass_cluster_check(tc: &Arc<Controller>, rule: &Arc<Rule>, ctx: &EntryContext) -> TokenResult {
    let service = match cluster::get_token_service() {
        Some(service) => service,
        // no token service available: fall back to the local check
        None => return fallback_to_local_or_pass(tc, rule, ctx),
    };
    let result = service.request_token(
        rule.cluster_config.flow_id,
        ctx.input().batch_count(),
        ctx.input().prioritized(),
    );
    match result.status {
        TokenStatus::Ok => TokenResult::new_pass(),
        TokenStatus::ShouldWait => {
            // wait for the next tick
            if result.wait_ms > 0 {
                utils::sleep_for_ms(result.wait_ms);
            }
            TokenResult::new_pass()
        }
        TokenStatus::Blocked => {
            let concrete_rule = Arc::clone(rule);
            let cause_rule: Arc<dyn FloodgateRule> = concrete_rule;
            TokenResult::new_blocked_with_cause(
                BlockType::Flow,
                "cluster flow check blocked".into(),
                cause_rule,
                Arc::new(result.remaining),
            )
        }
        TokenStatus::NoRuleExists
        | TokenStatus::BadRequest
        | TokenStatus::TooManyRequest
        | TokenStatus::Fail => fallback_to_local_or_pass(tc, rule, ctx),
    }
}

fn fallback_to_local_or_pass(
    tc: &Arc<Controller>,
    rule: &Arc<Rule>,
    ctx: &EntryContext,
) -> TokenResult {
    if rule.cluster_config.fallback_to_local_when_fail {
        pass_local_check(tc, rule, ctx)
    } else {
        // the rule is not activated, just pass
        TokenResult::new_pass()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::{enter_context, exit_context};
    use crate::base::{ResourceType, ResourceWrapper, FloodgateInput, TrafficType};
    use crate::base::StatPrepareSlot;
    use crate::stat::{ClusterBuilderSlot, NodeSelectorSlot};
    use crate::utils::AsAny;

    fn prepared_ctx(ctx_name: &str, res_name: &str, origin: &str) -> EntryContext {
        let ctx = enter_context(ctx_name, origin);
        let rw = ResourceWrapper::new(res_name.into(), ResourceType::Common, TrafficType::Inbound);
        let mut entry_ctx = EntryContext::new(rw, FloodgateInput::default(), ctx);
        NodeSelectorSlot::new().prepare(&mut entry_ctx);
        ClusterBuilderSlot::new().prepare(&mut entry_ctx);
        exit_context();
        entry_ctx
    }

    #[test]
    fn default_origin_selects_cluster_node() {
        let ctx = prepared_ctx("checker_default_ctx", "checker_default_res", "");
        let rule = Arc::new(Rule {
            resource: "checker_default_res".into(),
            threshold: 1.0,
            ..Default::default()
        });
        let node = select_node_by_origin_and_strategy(&rule, &ctx).unwrap();
        let cluster = ctx.cur_node().unwrap().cluster_node().clone();
        assert!(Arc::ptr_eq(
            &node.as_any_arc().downcast::<crate::stat::ClusterNode>().unwrap(),
            &cluster
        ));
    }

    #[test]
    fn matching_origin_selects_origin_node() {
        let ctx = prepared_ctx("checker_origin_ctx", "checker_origin_res", "caller-a");
        let rule = Arc::new(Rule {
            resource: "checker_origin_res".into(),
            limit_origin: "caller-a".into(),
            threshold: 1.0,
            ..Default::default()
        });
        let node = select_node_by_origin_and_strategy(&rule, &ctx).unwrap();
        let origin_node = ctx.origin_node().unwrap();
        assert!(Arc::ptr_eq(
            &node
                .as_any_arc()
                .downcast::<crate::stat::StatisticNode>()
                .unwrap(),
            &origin_node
        ));
    }

    #[test]
    fn chain_strategy_requires_matching_context() {
        let ctx = prepared_ctx("checker_chain_ctx", "checker_chain_res", "");
        let matching = Arc::new(Rule {
            resource: "checker_chain_res".into(),
            relation_strategy: RelationStrategy::Chain,
            ref_resource: "checker_chain_ctx".into(),
            threshold: 1.0,
            ..Default::default()
        });
        assert!(select_node_by_origin_and_strategy(&matching, &ctx).is_some());

        let unrelated = Arc::new(Rule {
            resource: "checker_chain_res".into(),
            relation_strategy: RelationStrategy::Chain,
            ref_resource: "some_other_ctx".into(),
            threshold: 1.0,
            ..Default::default()
        });
        assert!(select_node_by_origin_and_strategy(&unrelated, &ctx).is_none());
    }

    #[test]
    fn unrelated_origin_rule_is_skipped() {
        let ctx = prepared_ctx("checker_skip_ctx", "checker_skip_res", "caller-b");
        let rule = Arc::new(Rule {
            resource: "checker_skip_res".into(),
            limit_origin: "caller-a".into(),
            threshold: 1.0,
            ..Default::default()
        });
        assert!(select_node_by_origin_and_strategy(&rule, &ctx).is_none());
    }
}
