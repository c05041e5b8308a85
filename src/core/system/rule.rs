use crate::base::FloodgateRule;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The inbound indicator a system rule guards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum MetricType {
    /// pass rate of all inbound traffic
    InboundQps,
    /// live concurrency of all inbound traffic
    Concurrency,
    /// average response time of all inbound traffic, in ms
    AvgRt,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::InboundQps
    }
}

/// Rule describes one threshold of the global inbound guard. System rules
/// are process-wide: they are not bound to any single resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub id: String,
    pub metric_type: MetricType,
    pub threshold: f64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            metric_type: MetricType::default(),
            threshold: 0.0,
        }
    }
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.metric_type.hash(state);
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.metric_type == other.metric_type && self.threshold == other.threshold
    }
}

impl Eq for Rule {}

impl FloodgateRule for Rule {
    fn resource_name(&self) -> String {
        format!("{:?}", self.metric_type)
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
