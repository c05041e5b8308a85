use crate::base::{FloodgateRule, LIMIT_ORIGIN_DEFAULT};
use crate::{logging, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type Id = String;

/// RelationStrategy indicates which invocation the rule watches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationStrategy {
    /// flow control on the current resource directly
    Current,
    /// flow control driven by the associated resource in `ref_resource`
    Associated,
    /// flow control only when the current context equals `ref_resource`
    Chain,
}

impl Default for RelationStrategy {
    fn default() -> RelationStrategy {
        RelationStrategy::Current
    }
}

/// How the allowed threshold is computed per check.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum CalculateStrategy {
    Direct,
    WarmUp,
}

impl Default for CalculateStrategy {
    fn default() -> CalculateStrategy {
        CalculateStrategy::Direct
    }
}

/// What happens to requests beyond the allowed threshold.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum ControlStrategy {
    Reject,
    /// Throttling indicates that pending requests will be throttled,
    /// waiting in queue (until free capacity is available)
    Throttling,
}

impl Default for ControlStrategy {
    fn default() -> ControlStrategy {
        ControlStrategy::Reject
    }
}

/// The dimension the threshold applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    /// live concurrency of the selected node
    Concurrency,
    /// pass rate of the selected node, requests per second
    Qps,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::Qps
    }
}

/// How a cluster token server derives the global threshold from
/// `threshold`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterThresholdType {
    /// `threshold` is the global budget
    Global,
    /// `threshold` is the average budget per connected client
    AvgLocal,
}

impl Default for ClusterThresholdType {
    fn default() -> ClusterThresholdType {
        ClusterThresholdType::Global
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// globally unique id of the rule within the token server
    pub flow_id: u64,
    pub threshold_type: ClusterThresholdType,
    /// apply the local check when the token service is unavailable;
    /// pass otherwise
    pub fallback_to_local_when_fail: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            flow_id: 0,
            threshold_type: ClusterThresholdType::default(),
            fallback_to_local_when_fail: true,
        }
    }
}

/// Rule describes the strategy of flow control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// `id` represents the unique ID of the rule (optional).
    pub id: Id,
    /// `resource` represents the resource name.
    pub resource: String,
    /// the caller this rule limits: a concrete origin, `"default"` for
    /// every caller, or `"other"` for callers no other rule targets
    pub limit_origin: String,
    pub ref_resource: String,
    pub calculate_strategy: CalculateStrategy,
    pub control_strategy: ControlStrategy,
    pub relation_strategy: RelationStrategy,
    pub metric_type: MetricType,
    /// `threshold` means the admission budget per second (Qps) or the
    /// concurrency ceiling (Concurrency)
    pub threshold: f64,
    pub warm_up_period_sec: u32,
    pub warm_up_cold_factor: u32,
    /// `max_queueing_time_ms` only takes effect when `control_strategy` is
    /// Throttling. When it is 0, Throttling only controls the interval of
    /// requests, and requests exceeding the threshold are rejected
    /// directly.
    pub max_queueing_time_ms: u32,
    pub cluster_mode: bool,
    pub cluster_config: ClusterConfig,
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
        self.ref_resource.hash(state);
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            limit_origin: LIMIT_ORIGIN_DEFAULT.into(),
            ref_resource: String::default(),
            calculate_strategy: CalculateStrategy::default(),
            control_strategy: ControlStrategy::default(),
            relation_strategy: RelationStrategy::default(),
            metric_type: MetricType::default(),
            threshold: 0.0,
            warm_up_period_sec: 0,
            warm_up_cold_factor: 0,
            max_queueing_time_ms: 0,
            cluster_mode: false,
            cluster_config: ClusterConfig::default(),
        }
    }
}

impl FloodgateRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.limit_origin.is_empty() {
            return Err(Error::msg("empty limit_origin"));
        }
        if self.relation_strategy != RelationStrategy::Current && self.ref_resource.is_empty() {
            return Err(Error::msg(
                "ref_resource must be non empty when relation_strategy is Associated or Chain",
            ));
        }
        if self.calculate_strategy == CalculateStrategy::WarmUp {
            if self.warm_up_period_sec == 0 {
                return Err(Error::msg("warm_up_period_sec must be greater than 0"));
            }
            if self.warm_up_cold_factor == 1 {
                return Err(Error::msg("warm_up_cold_factor must be greater than 1"));
            }
            if self.metric_type != MetricType::Qps {
                return Err(Error::msg("warm-up only applies to QPS flow control"));
            }
        }
        if self.cluster_mode && self.cluster_config.flow_id == 0 {
            logging::warn!(
                "[Flow Rule] cluster_mode with a zero flow_id will never match a server rule, rule: {}",
                self
            );
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.limit_origin == other.limit_origin
            && self.ref_resource == other.ref_resource
            && self.calculate_strategy == other.calculate_strategy
            && self.control_strategy == other.control_strategy
            && self.relation_strategy == other.relation_strategy
            && self.metric_type == other.metric_type
            && self.threshold == other.threshold
            && self.warm_up_period_sec == other.warm_up_period_sec
            && self.warm_up_cold_factor == other.warm_up_cold_factor
            && self.max_queueing_time_ms == other.max_queueing_time_ms
            && self.cluster_mode == other.cluster_mode
            && self.cluster_config == other.cluster_config
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn is_valid_flow_rule() {
        let bad_rule1 = Rule {
            threshold: 1.0,
            resource: "".into(),
            ..Default::default()
        };
        let bad_rule2 = Rule {
            threshold: -1.9,
            resource: "test".into(),
            ..Default::default()
        };
        let bad_rule3 = Rule {
            threshold: 5.0,
            resource: "test".into(),
            calculate_strategy: CalculateStrategy::WarmUp,
            control_strategy: ControlStrategy::Reject,
            ..Default::default()
        };
        let bad_rule4 = Rule {
            threshold: 5.0,
            resource: "test".into(),
            relation_strategy: RelationStrategy::Associated,
            ..Default::default()
        };

        let good_rule1 = Rule {
            threshold: 10.0,
            resource: "test".into(),
            calculate_strategy: CalculateStrategy::WarmUp,
            control_strategy: ControlStrategy::Throttling,
            warm_up_period_sec: 10,
            warm_up_cold_factor: 3,
            max_queueing_time_ms: 10,
            ..Default::default()
        };
        let good_rule2 = Rule {
            threshold: 10.0,
            resource: "test".into(),
            relation_strategy: RelationStrategy::Chain,
            ref_resource: "entrance_a".into(),
            ..Default::default()
        };

        assert!(bad_rule1.is_valid().is_err());
        assert!(bad_rule2.is_valid().is_err());
        assert!(bad_rule3.is_valid().is_err());
        assert!(bad_rule4.is_valid().is_err());

        assert!(good_rule1.is_valid().is_ok());
        assert!(good_rule2.is_valid().is_ok());
    }

    #[test]
    fn rule_equality_ignores_id() {
        let r1 = Rule {
            resource: "abc".into(),
            threshold: 100.0,
            ..Default::default()
        };
        let mut r2 = r1.clone();
        r2.id = uuid::Uuid::new_v4().to_string();
        assert_eq!(r1, r2);
        r2.threshold = 200.0;
        assert_ne!(r1, r2);
    }
}
