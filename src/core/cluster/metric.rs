use crate::stat::{MetricTrait, OccupiableLeapArray, OccupySeed};
use crate::utils::curr_time_millis;
use crate::Result;
use enum_map::{Enum, EnumMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// The events a cluster token server records per flow rule.
/// `Pass`/`Block` count tokens, `PassRequest`/`BlockRequest` count
/// requests, the occupied events track priority borrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum ClusterFlowEvent {
    Pass,
    Block,
    PassRequest,
    BlockRequest,
    OccupiedPass,
    OccupiedBlock,
    Waiting,
}

#[derive(Debug, Default)]
pub struct ClusterMetricBucket {
    counter: EnumMap<ClusterFlowEvent, AtomicU64>,
}

impl MetricTrait for ClusterMetricBucket {
    fn reset(&self) {
        for (_, item) in &self.counter {
            item.store(0, Ordering::SeqCst);
        }
    }
}

impl ClusterMetricBucket {
    pub fn add(&self, event: ClusterFlowEvent, count: u64) {
        self.counter[event].fetch_add(count, Ordering::SeqCst);
    }

    pub fn get(&self, event: ClusterFlowEvent) -> u64 {
        self.counter[event].load(Ordering::SeqCst)
    }
}

impl OccupySeed for ClusterMetricBucket {
    fn booked(&self) -> u64 {
        self.get(ClusterFlowEvent::Pass)
    }

    fn book(&self, count: u64) {
        self.add(ClusterFlowEvent::Pass, count);
    }

    fn carry_over(&self, future: &Self) {
        self.add(ClusterFlowEvent::Pass, future.get(ClusterFlowEvent::Pass));
    }
}

/// The per-flow-rule sliding window of a token server.
#[derive(Debug)]
pub struct ClusterMetric {
    inner: OccupiableLeapArray<ClusterMetricBucket>,
}

impl ClusterMetric {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        Ok(ClusterMetric {
            inner: OccupiableLeapArray::new(sample_count, interval_ms)?,
        })
    }

    pub fn add(&self, event: ClusterFlowEvent, count: u64) {
        self.add_with_time(curr_time_millis(), event, count)
    }

    pub fn add_with_time(&self, now: u64, event: ClusterFlowEvent, count: u64) {
        if let Ok(bucket) = self.inner.get_bucket_of_time(now) {
            bucket.value().add(event, count);
        }
    }

    pub fn sum(&self, event: ClusterFlowEvent) -> u64 {
        self.sum_with_time(curr_time_millis(), event)
    }

    pub fn sum_with_time(&self, now: u64, event: ClusterFlowEvent) -> u64 {
        // make sure the current bucket is installed so stale buckets are
        // recycled before aggregation
        let _ = self.inner.get_bucket_of_time(now);
        let mut sum = 0;
        for bucket in self.inner.primary().get_valid_values(now) {
            sum += bucket.value().get(event);
        }
        sum
    }

    pub fn avg(&self, event: ClusterFlowEvent) -> f64 {
        self.sum(event) as f64 / self.inner.primary().interval_second()
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.inner.bucket_len_ms()
    }

    /// Try to book `acquire_count` tokens of the next window. Returns the
    /// wait in milliseconds until that window (one bucket length), or zero
    /// when the budget does not admit the borrowing.
    pub fn try_occupy_next(&self, acquire_count: u32, threshold: f64) -> u64 {
        let now = curr_time_millis();
        let latest_qps = self.avg(ClusterFlowEvent::Pass);
        if !self.can_occupy(now, acquire_count, latest_qps, threshold) {
            return 0;
        }
        let wait_ms = self.inner.bucket_len_ms() as u64;
        if self.inner.add_waiting(now + wait_ms, acquire_count as u64).is_err() {
            return 0;
        }
        self.add_with_time(now, ClusterFlowEvent::Waiting, acquire_count as u64);
        wait_ms
    }

    fn can_occupy(&self, now: u64, acquire_count: u32, latest_qps: f64, threshold: f64) -> bool {
        // the head bucket expires when the borrowed window arrives, so its
        // tokens come back to the budget
        let head_pass = self
            .inner
            .primary()
            .get_valid_values(now)
            .iter()
            .min_by_key(|b| b.start_stamp())
            .map(|b| b.value().get(ClusterFlowEvent::Pass))
            .unwrap_or(0) as f64;
        let occupied = self.inner.current_waiting(now) as f64;
        latest_qps + acquire_count as f64 + occupied - head_pass <= threshold
    }

    pub fn waiting(&self) -> u64 {
        self.inner.current_waiting(curr_time_millis())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_and_sum() {
        let m = ClusterMetric::new(10, 1000).unwrap();
        m.add(ClusterFlowEvent::Pass, 5);
        m.add(ClusterFlowEvent::PassRequest, 1);
        assert_eq!(m.sum(ClusterFlowEvent::Pass), 5);
        assert_eq!(m.sum(ClusterFlowEvent::PassRequest), 1);
        assert!((m.avg(ClusterFlowEvent::Pass) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn occupy_books_next_window() {
        let m = ClusterMetric::new(10, 1000).unwrap();
        // plenty of headroom: borrowing succeeds and waits one bucket
        let wait = m.try_occupy_next(1, 100.0);
        assert_eq!(wait, 100);
        assert_eq!(m.waiting(), 1);
        assert_eq!(m.sum(ClusterFlowEvent::Waiting), 1);
    }

    #[test]
    fn occupy_refused_beyond_budget() {
        let m = ClusterMetric::new(10, 1000).unwrap();
        // one token asked, budget of half a token: refused
        assert_eq!(m.try_occupy_next(1, 0.5), 0);
        assert_eq!(m.waiting(), 0);
    }
}
