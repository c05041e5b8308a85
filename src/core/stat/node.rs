use super::ArrayMetric;
use crate::base::{
    ConcurrencyStat, MetricEvent, MetricItem, MetricItemRetriever, OccupySupport, ReadStat,
    StatNode, TimePredicate, WriteStat, MINUTE_INTERVAL_MS, MINUTE_SAMPLE_COUNT,
};
use crate::config;
use crate::utils::curr_time_millis;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// The statistic node keeps three kinds of real-time metrics:
/// second-grained (with future-occupy support), minute-grained, and the
/// live concurrency. Flow rules read the second-grained window; the
/// minute-grained window feeds metric export and total-based checks.
#[derive(Debug)]
pub struct StatisticNode {
    second: ArrayMetric,
    minute: ArrayMetric,
    concurrency: AtomicU32,
    last_fetch_ms: AtomicU64,
}

impl Default for StatisticNode {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticNode {
    pub fn new() -> Self {
        StatisticNode {
            second: ArrayMetric::new(
                config::metric_stat_sample_count(),
                config::metric_stat_interval_ms(),
            )
            .unwrap(),
            minute: ArrayMetric::new_plain(MINUTE_SAMPLE_COUNT, MINUTE_INTERVAL_MS).unwrap(),
            concurrency: AtomicU32::new(0),
            last_fetch_ms: AtomicU64::new(0),
        }
    }

    pub fn pass_qps(&self) -> f64 {
        self.second.qps(MetricEvent::Pass)
    }

    pub fn block_qps(&self) -> f64 {
        self.second.qps(MetricEvent::Block)
    }

    pub fn total_qps(&self) -> f64 {
        self.pass_qps() + self.block_qps()
    }

    pub fn complete_qps(&self) -> f64 {
        self.second.qps(MetricEvent::Complete)
    }

    pub fn error_qps(&self) -> f64 {
        self.second.qps(MetricEvent::Error)
    }

    pub fn occupied_pass_qps(&self) -> f64 {
        self.minute.qps(MetricEvent::OccupiedPass)
    }

    /// Total requests (passed plus blocked) seen within the last minute.
    pub fn total_request(&self) -> u64 {
        self.minute.count(MetricEvent::Pass) + self.minute.count(MetricEvent::Block)
    }

    /// Pass rate of the previous one-second window.
    pub fn previous_pass_qps(&self) -> f64 {
        self.minute.previous_window_count(MetricEvent::Pass) as f64
    }

    pub(crate) fn second_metric(&self) -> &ArrayMetric {
        &self.second
    }

    pub(crate) fn minute_metric(&self) -> &ArrayMetric {
        &self.minute
    }

    /// Rows of per-second metrics newer than the previous fetch, excluding
    /// the (possibly still mutating) current second.
    pub fn metrics(&self) -> Vec<MetricItem> {
        let current_second = {
            let now = curr_time_millis();
            now - now % 1000
        };
        let last_fetch = self.last_fetch_ms.load(Ordering::SeqCst);
        let items = self
            .minute
            .details_on_condition(&move |ts| ts > last_fetch && ts < current_second);
        let mut new_last_fetch = last_fetch;
        for item in &items {
            new_last_fetch = new_last_fetch.max(item.timestamp);
        }
        self.last_fetch_ms.store(new_last_fetch, Ordering::SeqCst);
        items
    }
}

impl MetricItemRetriever for StatisticNode {
    fn metrics_on_condition(&self, predicate: &TimePredicate) -> Vec<MetricItem> {
        self.minute.details_on_condition(predicate)
    }
}

impl ReadStat for StatisticNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.second.qps(event)
    }

    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.minute.previous_window_count(event) as f64
    }

    fn sum(&self, event: MetricEvent) -> u64 {
        self.second.count(event)
    }

    fn total(&self, event: MetricEvent) -> u64 {
        self.minute.count(event)
    }

    fn min_rt(&self) -> f64 {
        self.second.min_rt()
    }

    fn avg_rt(&self) -> f64 {
        self.second.avg_rt()
    }
}

impl WriteStat for StatisticNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        match event {
            // occupied passes are book-kept in the minute window only; the
            // second window receives them through the future-ring migration
            MetricEvent::OccupiedPass => {
                self.minute.add_count(event, count);
            }
            _ => {
                self.second.add_count(event, count);
                self.minute.add_count(event, count);
            }
        }
    }
}

impl ConcurrencyStat for StatisticNode {
    fn current_concurrency(&self) -> u32 {
        self.concurrency.load(Ordering::SeqCst)
    }

    fn increase_concurrency(&self) {
        self.concurrency.fetch_add(1, Ordering::SeqCst);
    }

    fn decrease_concurrency(&self) {
        self.concurrency.fetch_sub(1, Ordering::SeqCst);
    }
}

impl OccupySupport for StatisticNode {
    /// Walk the upcoming windows, earliest first, and return the wait (ms)
    /// until the first one whose budget still admits `acquire_count` more
    /// tokens. Windows further away than the occupy timeout are never
    /// considered; the timeout itself means "refuse".
    fn try_occupy_next(&self, now: u64, acquire_count: u32, threshold: f64) -> u64 {
        let occupy_timeout = config::occupy_timeout_ms() as u64;
        let interval_ms = self.second.interval_ms() as u64;
        let max_count = threshold * interval_ms as f64 / 1000.0;
        let current_borrow = self.second.waiting_with_time(now) as f64;
        if current_borrow >= max_count {
            return occupy_timeout;
        }

        let window_len = self.second.bucket_len_ms() as u64;
        let mut earliest = now - now % window_len + window_len - interval_ms;
        let mut idx: u64 = 0;
        // `current_pass` may undercount what is really passing NOW; under
        // high concurrency this lets slightly more tokens be borrowed.
        let mut current_pass = self.second.count_with_time(now, MetricEvent::Pass) as f64;
        while earliest < now {
            let wait_ms = idx * window_len + window_len - now % window_len;
            if wait_ms >= occupy_timeout {
                break;
            }
            let window_pass = self.second.window_count(earliest, MetricEvent::Pass) as f64;
            if current_pass + current_borrow + acquire_count as f64 - window_pass <= max_count {
                return wait_ms;
            }
            earliest += window_len;
            current_pass -= window_pass;
            idx += 1;
        }
        occupy_timeout
    }

    fn waiting(&self) -> u64 {
        self.second.waiting()
    }

    fn add_waiting_request(&self, future_time: u64, acquire_count: u32) {
        self.second.add_waiting(future_time, acquire_count as u64);
    }

    fn add_occupied_pass(&self, acquire_count: u32) {
        self.minute
            .add_count(MetricEvent::Pass, acquire_count as u64);
        self.minute
            .add_count(MetricEvent::OccupiedPass, acquire_count as u64);
    }
}

impl StatNode for StatisticNode {}
