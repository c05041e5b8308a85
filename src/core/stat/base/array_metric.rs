use super::{BucketWrap, LeapArray, MetricBucket, OccupiableLeapArray};
use crate::base::{MetricEvent, MetricItem, TimePredicate, DEFAULT_STATISTIC_MAX_RT};
use crate::utils::curr_time_millis;
use crate::{logging, Result};
use std::cmp;
use std::sync::Arc;

/// The storage behind an ArrayMetric: second-grained metrics carry a future
/// ring for priority occupation, minute-grained metrics do not.
#[derive(Debug)]
enum MetricStorage {
    Occupiable(OccupiableLeapArray<MetricBucket>),
    Plain(LeapArray<MetricBucket>),
}

/// The aggregation facade over a bucket leap array. All "add" operations
/// target the bucket containing the given time; all getters aggregate over
/// the valid buckets of the window.
#[derive(Debug)]
pub struct ArrayMetric {
    data: MetricStorage,
}

impl ArrayMetric {
    /// A metric with "borrow from the future" support.
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        Ok(ArrayMetric {
            data: MetricStorage::Occupiable(OccupiableLeapArray::new(sample_count, interval_ms)?),
        })
    }

    /// A metric without a future ring.
    pub fn new_plain(sample_count: u32, interval_ms: u32) -> Result<Self> {
        Ok(ArrayMetric {
            data: MetricStorage::Plain(LeapArray::new(sample_count, interval_ms)?),
        })
    }

    fn array(&self) -> &LeapArray<MetricBucket> {
        match &self.data {
            MetricStorage::Occupiable(o) => o.primary(),
            MetricStorage::Plain(p) => p,
        }
    }

    fn bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<MetricBucket>>> {
        match &self.data {
            MetricStorage::Occupiable(o) => o.get_bucket_of_time(now),
            MetricStorage::Plain(p) => p.get_bucket_of_time(now),
        }
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.array().bucket_len_ms()
    }

    pub fn sample_count(&self) -> u32 {
        self.array().sample_count()
    }

    pub fn interval_ms(&self) -> u32 {
        self.array().interval_ms()
    }

    pub fn interval_second(&self) -> f64 {
        self.array().interval_second()
    }

    pub fn add_count(&self, event: MetricEvent, count: u64) {
        self.add_count_with_time(curr_time_millis(), event, count);
    }

    pub fn add_count_with_time(&self, now: u64, event: MetricEvent, count: u64) {
        match self.bucket_of_time(now) {
            Ok(bucket) => bucket.value().add(event, count),
            Err(err) => logging::error!("failed to record metric event {:?}: {}", event, err),
        }
    }

    pub fn count(&self, event: MetricEvent) -> u64 {
        self.count_with_time(curr_time_millis(), event)
    }

    pub fn count_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        let mut res = 0;
        for b in self.array().get_valid_values(now) {
            res += b.value().get(event);
        }
        res
    }

    pub fn qps(&self, event: MetricEvent) -> f64 {
        self.qps_with_time(curr_time_millis(), event)
    }

    pub fn qps_with_time(&self, now: u64, event: MetricEvent) -> f64 {
        self.count_with_time(now, event) as f64 / self.interval_second()
    }

    /// Count of the event in the bucket exactly before `now`'s.
    pub fn previous_window_count(&self, event: MetricEvent) -> u64 {
        self.previous_window_count_with_time(curr_time_millis(), event)
    }

    pub fn previous_window_count_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.array()
            .get_previous_bucket_of_time(now)
            .map(|b| b.value().get(event))
            .unwrap_or(0)
    }

    /// Count of the event in the bucket installed for the window containing
    /// `time`, zero when that window was never touched.
    pub fn window_count(&self, time: u64, event: MetricEvent) -> u64 {
        self.array()
            .get_window_value(time)
            .map(|b| b.value().get(event))
            .unwrap_or(0)
    }

    pub fn min_rt(&self) -> f64 {
        let mut res = DEFAULT_STATISTIC_MAX_RT;
        for b in self.array().get_current_values() {
            res = cmp::min(res, b.value().min_rt());
        }
        res as f64
    }

    pub fn avg_rt(&self) -> f64 {
        let completed = self.count(MetricEvent::Complete);
        if completed == 0 {
            0f64
        } else {
            self.count(MetricEvent::Rt) as f64 / completed as f64
        }
    }

    // occupy support, meaningful on second-grained metrics only

    pub fn add_waiting(&self, future_time: u64, count: u64) {
        match &self.data {
            MetricStorage::Occupiable(o) => {
                if let Err(err) = o.add_waiting(future_time, count) {
                    logging::error!("failed to book future tokens: {}", err);
                }
            }
            MetricStorage::Plain(_) => {
                debug_assert!(false, "add_waiting on a metric without a future ring");
            }
        }
    }

    pub fn waiting(&self) -> u64 {
        self.waiting_with_time(curr_time_millis())
    }

    pub fn waiting_with_time(&self, now: u64) -> u64 {
        match &self.data {
            MetricStorage::Occupiable(o) => o.current_waiting(now),
            MetricStorage::Plain(_) => 0,
        }
    }

    /// Per-bucket breakdown of the valid windows at `now`.
    pub fn details(&self) -> Vec<MetricItem> {
        self.details_on_condition(&|_| true)
    }

    pub fn details_on_condition(&self, condition: &TimePredicate) -> Vec<MetricItem> {
        let now = curr_time_millis();
        let mut items = Vec::new();
        for b in self.array().get_valid_values_conditional(now, condition) {
            items.push(metric_item_from_bucket(&b));
        }
        items.sort_unstable_by_key(|item| item.timestamp);
        items
    }
}

fn metric_item_from_bucket(bucket: &Arc<BucketWrap<MetricBucket>>) -> MetricItem {
    let timestamp = bucket.start_stamp();
    let bucket = bucket.value();
    let complete_qps = bucket.get(MetricEvent::Complete);
    let avg_rt = if complete_qps > 0 {
        bucket.get(MetricEvent::Rt) / complete_qps
    } else {
        bucket.get(MetricEvent::Rt)
    };
    MetricItem {
        timestamp,
        pass_qps: bucket.get(MetricEvent::Pass),
        block_qps: bucket.get(MetricEvent::Block),
        complete_qps,
        error_qps: bucket.get(MetricEvent::Error),
        occupied_pass_qps: bucket.get(MetricEvent::OccupiedPass),
        avg_rt,
        ..MetricItem::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE_COUNT: u32 = 2;
    const INTERVAL_MS: u32 = 1000;

    #[test]
    fn add_and_count() {
        let m = ArrayMetric::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1676296040000u64;
        m.add_count_with_time(now, MetricEvent::Pass, 3);
        m.add_count_with_time(now + 500, MetricEvent::Pass, 2);
        m.add_count_with_time(now + 500, MetricEvent::Block, 1);
        assert_eq!(m.count_with_time(now + 500, MetricEvent::Pass), 5);
        assert_eq!(m.count_with_time(now + 500, MetricEvent::Block), 1);
        assert!((m.qps_with_time(now + 500, MetricEvent::Pass) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn previous_window() {
        let m = ArrayMetric::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1676296040000u64;
        m.add_count_with_time(now, MetricEvent::Pass, 4);
        assert_eq!(
            m.previous_window_count_with_time(now + 500, MetricEvent::Pass),
            4
        );
    }

    #[test]
    fn window_count() {
        let m = ArrayMetric::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1676296040000u64;
        m.add_count_with_time(now, MetricEvent::Pass, 4);
        assert_eq!(m.window_count(now, MetricEvent::Pass), 4);
        assert_eq!(m.window_count(now + 500, MetricEvent::Pass), 0);
    }

    #[test]
    fn details_match_totals() {
        let m = ArrayMetric::new_plain(60, 60_000).unwrap();
        let now = curr_time_millis();
        m.add_count_with_time(now, MetricEvent::Pass, 3);
        m.add_count_with_time(now + 1000, MetricEvent::Pass, 5);
        let details = m.details();
        let detail_sum: u64 = details.iter().map(|item| item.pass_qps).sum();
        assert_eq!(detail_sum, m.count(MetricEvent::Pass));
    }

    #[test]
    fn min_rt_default() {
        let m = ArrayMetric::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        assert!((m.min_rt() - DEFAULT_STATISTIC_MAX_RT as f64).abs() < f64::EPSILON);
    }
}
