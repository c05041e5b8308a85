use super::{
    allow_proceed, connected_count, get_cluster_metric, get_namespace, ClusterFlowEvent,
    ClusterTokenResult, TokenStatus,
};
use crate::config;
use crate::config::DEFAULT_CLUSTER_EXCEED_COUNT;
use crate::core::flow::{ClusterThresholdType, Rule};
use std::sync::Arc;

fn calc_global_threshold(rule: &Arc<Rule>) -> f64 {
    let count = rule.threshold;
    match rule.cluster_config.threshold_type {
        ClusterThresholdType::Global => count,
        ClusterThresholdType::AvgLocal => {
            count * connected_count(rule.cluster_config.flow_id) as f64
        }
    }
}

/// The server-side admission decision for one token request.
pub fn acquire_cluster_token(
    rule: &Arc<Rule>,
    acquire_count: u32,
    prioritized: bool,
) -> ClusterTokenResult {
    let flow_id = rule.cluster_config.flow_id;

    // the namespace-level request limiter sheds load before any rule logic
    if let Some(namespace) = get_namespace(flow_id) {
        if !allow_proceed(&namespace) {
            return ClusterTokenResult::new(TokenStatus::TooManyRequest);
        }
    }

    let metric = match get_cluster_metric(flow_id) {
        Some(metric) => metric,
        None => return ClusterTokenResult::new(TokenStatus::Fail),
    };

    let latest_qps = metric.avg(ClusterFlowEvent::Pass);
    let global_threshold = calc_global_threshold(rule) * DEFAULT_CLUSTER_EXCEED_COUNT;
    let next_remaining = global_threshold - latest_qps - acquire_count as f64;

    if next_remaining >= 0.0 {
        metric.add(ClusterFlowEvent::Pass, acquire_count as u64);
        metric.add(ClusterFlowEvent::PassRequest, 1);
        if prioritized {
            metric.add(ClusterFlowEvent::OccupiedPass, acquire_count as u64);
        }
        return ClusterTokenResult::ok(next_remaining as i64);
    }
    if prioritized {
        // a prioritized request may borrow from upcoming windows within
        // the configured occupation ratio
        let occupy_avg = metric.avg(ClusterFlowEvent::Waiting);
        if occupy_avg <= config::occupy_max_ratio() * global_threshold {
            let wait_ms = metric.try_occupy_next(acquire_count, global_threshold);
            if wait_ms > 0 {
                return ClusterTokenResult::should_wait(wait_ms);
            }
        }
    }
    metric.add(ClusterFlowEvent::Block, acquire_count as u64);
    metric.add(ClusterFlowEvent::BlockRequest, 1);
    if prioritized {
        metric.add(ClusterFlowEvent::OccupiedBlock, acquire_count as u64);
    }
    ClusterTokenResult::blocked()
}

#[cfg(test)]
mod test {
    use super::super::{register_cluster_rules, set_connected_count, DefaultTokenService, TokenService};
    use super::*;
    use crate::flow::ClusterConfig;

    fn cluster_rule(res: &str, flow_id: u64, threshold: f64) -> Arc<Rule> {
        Arc::new(Rule {
            resource: res.into(),
            threshold,
            cluster_mode: true,
            cluster_config: ClusterConfig {
                flow_id,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn tokens_until_threshold() {
        let rule = cluster_rule("cluster_checker_basic", 921, 3.0);
        register_cluster_rules("cluster_checker_ns1", vec![rule.clone()]);
        assert_eq!(
            acquire_cluster_token(&rule, 1, false).status,
            TokenStatus::Ok
        );
        assert_eq!(
            acquire_cluster_token(&rule, 1, false).status,
            TokenStatus::Ok
        );
        assert_eq!(
            acquire_cluster_token(&rule, 1, false).status,
            TokenStatus::Ok
        );
        assert_eq!(
            acquire_cluster_token(&rule, 1, false).status,
            TokenStatus::Blocked
        );
    }

    #[test]
    fn avg_local_scales_with_clients() {
        let rule = Arc::new(Rule {
            resource: "cluster_checker_avg_local".into(),
            threshold: 2.0,
            cluster_mode: true,
            cluster_config: ClusterConfig {
                flow_id: 922,
                threshold_type: ClusterThresholdType::AvgLocal,
                ..Default::default()
            },
            ..Default::default()
        });
        register_cluster_rules("cluster_checker_ns2", vec![rule.clone()]);
        set_connected_count(922, 3);
        assert!((calc_global_threshold(&rule) - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn prioritized_request_waits_for_next_window() {
        let rule = cluster_rule("cluster_checker_occupy", 923, 2.0);
        register_cluster_rules("cluster_checker_ns3", vec![rule.clone()]);
        // exhaust the budget
        assert_eq!(
            acquire_cluster_token(&rule, 2, false).status,
            TokenStatus::Ok
        );
        let result = acquire_cluster_token(&rule, 1, true);
        assert_eq!(result.status, TokenStatus::ShouldWait);
        assert!(result.wait_ms > 0);
    }

    #[test]
    fn end_to_end_via_token_service() {
        let rule = cluster_rule("cluster_checker_e2e", 924, 1.0);
        register_cluster_rules("cluster_checker_ns4", vec![rule]);
        let service = DefaultTokenService::new();
        assert_eq!(service.request_token(924, 1, false).status, TokenStatus::Ok);
        assert_eq!(
            service.request_token(924, 1, false).status,
            TokenStatus::Blocked
        );
    }
}
