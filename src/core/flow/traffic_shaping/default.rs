use super::{Calculator, Checker, Controller};
use crate::base::{BlockType, MetricEvent, StatNode, TokenResult};
use crate::core::flow::{MetricType, Rule};
use crate::{config, utils};
use std::sync::{Arc, Weak};

/// Provides the rule's threshold unchanged.
#[derive(Debug)]
pub struct DirectCalculator {
    owner: Weak<Controller>,
    threshold: f64,
}

impl DirectCalculator {
    pub fn new(owner: Weak<Controller>, threshold: f64) -> Self {
        DirectCalculator { owner, threshold }
    }
}

impl Calculator for DirectCalculator {
    fn get_owner(&self) -> &Weak<Controller> {
        &self.owner
    }

    fn set_owner(&mut self, owner: Weak<Controller>) {
        self.owner = owner;
    }

    fn calculate_allowed_threshold(
        &self,
        _node: Option<&Arc<dyn StatNode>>,
        _batch_count: u32,
    ) -> f64 {
        self.threshold
    }
}

/// Rejects immediately when the selected node's usage plus the acquired
/// batch exceeds the threshold. A prioritized QPS request gets one more
/// chance: it may book tokens of an upcoming window and wait for it.
#[derive(Debug)]
pub struct RejectChecker {
    owner: Weak<Controller>,
    rule: Arc<Rule>,
}

impl RejectChecker {
    pub fn new(owner: Weak<Controller>, rule: Arc<Rule>) -> Self {
        RejectChecker { owner, rule }
    }
}

impl Checker for RejectChecker {
    fn get_owner(&self) -> &Weak<Controller> {
        &self.owner
    }

    fn set_owner(&mut self, owner: Weak<Controller>) {
        self.owner = owner;
    }

    fn do_check(
        &self,
        stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
        threshold: f64,
        prioritized: bool,
    ) -> TokenResult {
        let node = match stat_node {
            Some(node) => node,
            None => return TokenResult::new_pass(),
        };
        let cur_count = match self.rule.metric_type {
            MetricType::Concurrency => node.current_concurrency() as f64,
            MetricType::Qps => node.qps(MetricEvent::Pass),
        };
        if cur_count + batch_count as f64 <= threshold {
            return TokenResult::new_pass();
        }
        if prioritized && self.rule.metric_type == MetricType::Qps {
            let occupy_timeout = config::occupy_timeout_ms() as u64;
            let now = utils::curr_time_millis();
            let wait_ms = node.try_occupy_next(now, batch_count, threshold);
            if wait_ms < occupy_timeout {
                node.add_waiting_request(now + wait_ms, batch_count);
                node.add_occupied_pass(batch_count);
                return TokenResult::new_occupied_wait(wait_ms);
            }
        }
        TokenResult::new_blocked_with_cause(
            BlockType::Flow,
            "flow reject check blocked".into(),
            self.rule.clone(),
            Arc::new(cur_count),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ConcurrencyStat, WriteStat};
    use crate::stat::StatisticNode;

    fn qps_rule(threshold: f64) -> Arc<Rule> {
        Arc::new(Rule {
            resource: "reject_checker_test".into(),
            threshold,
            ..Default::default()
        })
    }

    #[test]
    fn below_threshold_passes() {
        let checker = RejectChecker::new(Weak::new(), qps_rule(2.0));
        let node: Arc<dyn StatNode> = Arc::new(StatisticNode::new());
        assert!(checker.do_check(Some(node), 1, 2.0, false).is_pass());
    }

    #[test]
    fn above_threshold_blocks() {
        let checker = RejectChecker::new(Weak::new(), qps_rule(2.0));
        let node = Arc::new(StatisticNode::new());
        node.add_count(MetricEvent::Pass, 2);
        let node: Arc<dyn StatNode> = node;
        let r = checker.do_check(Some(node), 1, 2.0, false);
        assert!(r.is_blocked());
        assert_eq!(r.block_err().unwrap().block_type(), BlockType::Flow);
    }

    #[test]
    fn concurrency_metric() {
        let rule = Arc::new(Rule {
            resource: "reject_checker_threads".into(),
            metric_type: MetricType::Concurrency,
            threshold: 1.0,
            ..Default::default()
        });
        let checker = RejectChecker::new(Weak::new(), rule);
        let node = Arc::new(StatisticNode::new());
        node.increase_concurrency();
        let node: Arc<dyn StatNode> = node;
        assert!(checker.do_check(Some(node.clone()), 1, 1.0, false).is_blocked());
        // priority does not apply to concurrency rules
        assert!(checker.do_check(Some(node), 1, 1.0, true).is_blocked());
    }
}
