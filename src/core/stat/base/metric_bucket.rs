use super::{MetricTrait, OccupySeed};
use crate::base::{MetricEvent, DEFAULT_STATISTIC_MAX_RT};
use enum_map::EnumMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// MetricBucket records the metrics of one minimum time unit (the bucket
/// time span). All operations of the MetricBucket are thread-safe.
#[derive(Debug)]
pub struct MetricBucket {
    // EnumMap works as fast as a plain array
    counter: EnumMap<MetricEvent, AtomicU64>,
    min_rt: AtomicU64,
}

impl MetricTrait for MetricBucket {
    fn reset(&self) {
        for (_, item) in &self.counter {
            item.store(0, Ordering::SeqCst);
        }
        self.min_rt
            .store(DEFAULT_STATISTIC_MAX_RT, Ordering::SeqCst);
    }
}

impl Default for MetricBucket {
    fn default() -> Self {
        MetricBucket {
            counter: EnumMap::default(),
            min_rt: AtomicU64::new(DEFAULT_STATISTIC_MAX_RT),
        }
    }
}

impl MetricBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add statistic count for the given metric event.
    pub fn add(&self, event: MetricEvent, count: u64) {
        match event {
            MetricEvent::Rt => self.add_rt(count),
            _ => self.add_count(event, count),
        }
    }

    pub fn add_count(&self, event: MetricEvent, count: u64) {
        self.counter[event].fetch_add(count, Ordering::SeqCst);
    }

    pub fn add_rt(&self, round_trip: u64) {
        self.add_count(MetricEvent::Rt, round_trip);
        if round_trip < self.min_rt.load(Ordering::SeqCst) {
            // Might not be accurate here.
            self.min_rt.store(round_trip, Ordering::SeqCst);
        }
    }

    /// Get the current statistic count of the given metric event.
    pub fn get(&self, event: MetricEvent) -> u64 {
        self.counter[event].load(Ordering::SeqCst)
    }

    pub fn min_rt(&self) -> u64 {
        self.min_rt.load(Ordering::SeqCst)
    }
}

impl OccupySeed for MetricBucket {
    fn booked(&self) -> u64 {
        self.get(MetricEvent::Pass)
    }

    fn book(&self, count: u64) {
        self.add_count(MetricEvent::Pass, count);
    }

    fn carry_over(&self, future: &Self) {
        self.add_count(MetricEvent::Pass, future.get(MetricEvent::Pass));
    }
}
