use crate::base::FloodgateRule;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type Id = String;

/// The indicator a degrade rule watches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Strategy {
    /// trips when the average response time stays above the threshold (ms)
    /// for `rt_slow_request_amount` consecutive slow requests
    AvgRt,
    /// trips when the ratio of errors to completions exceeds the threshold
    ErrorRatio,
    /// trips when the error total of the last minute reaches the threshold
    ErrorCount,
}

impl Default for Strategy {
    fn default() -> Strategy {
        Strategy::AvgRt
    }
}

pub const DEFAULT_MIN_REQUEST_AMOUNT: u64 = 5;
pub const DEFAULT_RT_SLOW_REQUEST_AMOUNT: u64 = 5;

/// Rule describes the circuit breaking strategy of one resource. Once the
/// rule trips, every call is rejected until the recovery timeout elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// `id` represents the unique ID of the rule (optional).
    pub id: Id,
    /// `resource` represents the resource name.
    pub resource: String,
    pub strategy: Strategy,
    /// RT threshold (ms), error-ratio threshold, or error-count threshold,
    /// depending on the strategy
    pub threshold: f64,
    /// recovery timeout (in seconds) after the rule tripped
    pub retry_timeout_sec: u32,
    /// the minimum request amount (per second) that can trip an
    /// error-ratio rule
    pub min_request_amount: u64,
    /// the minimum number of consecutive slow requests that can trip an
    /// average-RT rule
    pub rt_slow_request_amount: u64,
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            strategy: Strategy::default(),
            threshold: 0.0,
            retry_timeout_sec: 0,
            min_request_amount: DEFAULT_MIN_REQUEST_AMOUNT,
            rt_slow_request_amount: DEFAULT_RT_SLOW_REQUEST_AMOUNT,
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
        if self.retry_timeout_sec == 0 {
            return Err(Error::msg("retry_timeout_sec must be greater than 0"));
        }
        if self.strategy == Strategy::ErrorRatio && self.threshold > 1.0 {
            return Err(Error::msg(
                "the error-ratio threshold must be in the range [0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.strategy == other.strategy
            && self.threshold == other.threshold
            && self.retry_timeout_sec == other.retry_timeout_sec
            && self.min_request_amount == other.min_request_amount
            && self.rt_slow_request_amount == other.rt_slow_request_amount
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
    fn validity() {
        let good = Rule {
            resource: "degrade_rule_test".into(),
            strategy: Strategy::ErrorRatio,
            threshold: 0.5,
            retry_timeout_sec: 2,
            ..Default::default()
        };
        good.is_valid().unwrap();

        let mut bad = good.clone();
        bad.resource = String::new();
        assert!(bad.is_valid().is_err());

        let mut bad = good.clone();
        bad.retry_timeout_sec = 0;
        assert!(bad.is_valid().is_err());

        let mut bad = good;
        bad.threshold = 1.5;
        assert!(bad.is_valid().is_err());
    }
}
