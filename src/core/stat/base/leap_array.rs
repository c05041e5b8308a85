use crate::base::{check_validity_for_statistic, TimePredicate};
use crate::utils::curr_time_millis;
use crate::Result;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const DEFAULT_TIME: u64 = 0;

/// use atomic types to ensure the metric's internal mutability,
/// otherwise an exclusive Mutex would be necessary on the LeapArray Arc
/// shared among threads
pub trait MetricTrait: fmt::Debug + Default + Send + Sync {
    fn reset(&self);
}

/// BucketWrap represents a slot recording metrics for one time span.
/// The metric itself must be atomic.
/// The scope of time is [start_stamp, start_stamp + bucket_len_ms).
#[derive(Debug, Default)]
pub struct BucketWrap<T: MetricTrait> {
    // The start timestamp of this statistic bucket wrapper.
    start_stamp: AtomicU64,
    // The actual data structure recording the metrics (e.g. MetricBucket).
    value: T,
}

impl<T: MetricTrait> BucketWrap<T> {
    pub fn new(start_stamp: u64) -> Self {
        BucketWrap {
            start_stamp: AtomicU64::new(start_stamp),
            value: T::default(),
        }
    }

    pub fn start_stamp(&self) -> u64 {
        self.start_stamp.load(Ordering::SeqCst)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn reset_start_stamp(&self, start_stamp: u64) {
        self.start_stamp.store(start_stamp, Ordering::SeqCst);
    }

    pub fn reset_value(&self) {
        self.value.reset();
    }

    pub fn is_deprecated(&self, now: u64, interval_ms: u64) -> bool {
        let start = self.start_stamp.load(Ordering::SeqCst);
        now > start && now - start > interval_ms
    }
}

/// The ring of statistic buckets covering a fixed interval.
/// `sample_count` is the number of buckets and `interval_ms` the covered
/// time span, so each bucket spans `interval_ms / sample_count`
/// milliseconds. Stale buckets are recycled in place under a per-slot
/// try-lock; counter updates rely on the inner atomic metric type `T`.
#[derive(Debug)]
pub struct LeapArray<T: MetricTrait> {
    bucket_len_ms: u32,
    sample_count: u32,
    interval_ms: u32,
    pub(crate) array: Vec<Arc<BucketWrap<T>>>,
    mutex: Vec<Mutex<()>>,
}

impl<T: MetricTrait> LeapArray<T> {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        check_validity_for_statistic(sample_count, interval_ms)?;
        let mut array = Vec::with_capacity(sample_count as usize);
        let mut mutex = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            array.push(Arc::new(BucketWrap::default()));
            mutex.push(Mutex::new(()));
        }
        Ok(LeapArray {
            bucket_len_ms: interval_ms / sample_count,
            sample_count,
            interval_ms,
            array,
            mutex,
        })
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.bucket_len_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn interval_second(&self) -> f64 {
        self.interval_ms as f64 / 1000.0
    }

    pub fn current_bucket(&self) -> Result<Arc<BucketWrap<T>>> {
        self.get_bucket_of_time(curr_time_millis())
    }

    pub fn get_bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<T>>> {
        self.get_bucket_of_time_seeded(now, &|_| {})
    }

    /// Get the bucket containing `now` from the ring:
    /// - (1) The bucket is absent: take over the zeroed slot.
    /// - (2) The bucket is up-to-date: return it.
    /// - (3) The bucket is stale: reset it in place under the slot's update
    ///   lock. The lock has a tiny scope and takes effect only when the
    ///   bucket is deprecated, so in most cases it costs nothing.
    /// - (4) The bucket is ahead of `now` (clock regression): return a
    ///   transient bucket not installed in the ring, so the ring is never
    ///   corrupted by a jumping clock.
    ///
    /// `seed` runs on every freshly installed or recycled bucket value,
    /// before it becomes visible under the new start stamp to this caller;
    /// the occupiable variant uses it to migrate borrowed tokens.
    pub(crate) fn get_bucket_of_time_seeded(
        &self,
        now: u64,
        seed: &dyn Fn(&T),
    ) -> Result<Arc<BucketWrap<T>>> {
        let idx = self.time2idx(now) as usize;
        let target_start = self.calculate_start_stamp(now);
        let bucket = self.array[idx].clone();
        loop {
            let start = bucket.start_stamp();
            if start == target_start {
                /*
                    B0       B1      B2     B3      B4
                ||_______|_______|_______|_______|_______||___
                200     400     600     800     1000    1200  timestamp
                                            ^
                                         time=888
                The bucket is up-to-date, return it.
                */
                return Ok(Arc::clone(&bucket));
            } else if start == DEFAULT_TIME || start < target_start {
                /*
                  (old)
                            B0       B1      B2    NULL      B4
                |_______||_______|_______|_______|_______|_______||___
                ...    1200     1400    1600    1800    2000    2200  timestamp
                                             ^
                                          time=1676
                The bucket is either unused or deprecated after a full
                wrap-around; it must be (re)installed for the new start.
                Reset, seeding and the stamp update cannot be one atomic
                step, so the slot's update lock guards them: exactly one
                winner installs the bucket, losers yield and retry,
                observing either the old bucket or the fully installed one.
                The lock has a tiny scope and takes effect only on a window
                change, so in most cases it costs nothing.
                */
                if let Ok(_guard) = self.mutex[idx].try_lock() {
                    if bucket.start_stamp() == start {
                        bucket.reset_value();
                        seed(bucket.value());
                        bucket.reset_start_stamp(target_start);
                        return Ok(Arc::clone(&bucket));
                    }
                } else {
                    std::thread::yield_now();
                }
            } else {
                // start > target_start: the clock went backwards. Hand out
                // a transient bucket so neither the ring nor the caller is
                // corrupted.
                return Ok(Arc::new(BucketWrap::new(target_start)));
            }
        }
    }

    /// Get the bucket whose interval is exactly the one before `now`'s,
    /// if it is still valid.
    pub fn get_previous_bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<T>>> {
        let previous = now - (self.bucket_len_ms as u64);
        let idx = self.time2idx(previous) as usize;
        let bucket = self.array[idx].clone();
        if bucket.is_deprecated(now, self.interval_ms as u64) {
            return Err(crate::Error::msg("the previous bucket is deprecated"));
        }
        if bucket.start_stamp() != self.calculate_start_stamp(previous) {
            return Err(crate::Error::msg(
                "the start stamp of the previous bucket is not matched",
            ));
        }
        Ok(bucket)
    }

    /// Exact-start lookup: the bucket whose interval contains `now`, only
    /// if it is already installed for that interval.
    pub fn get_window_value(&self, now: u64) -> Option<Arc<BucketWrap<T>>> {
        let idx = self.time2idx(now) as usize;
        let bucket = &self.array[idx];
        if bucket.start_stamp() == self.calculate_start_stamp(now) {
            Some(Arc::clone(bucket))
        } else {
            None
        }
    }

    /// compute the start timestamp of the bucket containing `now`
    pub(crate) fn calculate_start_stamp(&self, now: u64) -> u64 {
        now - now % (self.bucket_len_ms as u64)
    }

    pub(crate) fn time2idx(&self, now: u64) -> u64 {
        let idx = now / (self.bucket_len_ms as u64);
        idx % (self.sample_count as u64)
    }

    pub fn get_current_values(&self) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values(curr_time_millis())
    }

    /// Get all buckets in [now - interval, now].
    pub fn get_valid_values(&self, now: u64) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values_conditional(now, &|_| true)
    }

    pub fn get_valid_values_conditional(
        &self,
        now: u64,
        condition: &TimePredicate,
    ) -> Vec<Arc<BucketWrap<T>>> {
        let mut res = Vec::new();
        for bucket in &self.array {
            if bucket.start_stamp() != DEFAULT_TIME
                && !bucket.is_deprecated(now, self.interval_ms as u64)
                && condition(bucket.start_stamp())
            {
                res.push(bucket.clone());
            }
        }
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicU64;

    const SAMPLE_COUNT: u32 = 20;
    const BUCKET_LEN_MS: u32 = 500; // 500 ms
    const INTERVAL_MS: u32 = BUCKET_LEN_MS * SAMPLE_COUNT; // 10 s

    impl MetricTrait for AtomicU64 {
        fn reset(&self) {
            self.store(0, Ordering::SeqCst);
        }
    }
    type LeapArrayAtomicU64 = LeapArray<AtomicU64>;

    #[test]
    fn invalid_geometry() {
        assert!(LeapArrayAtomicU64::new(0, 1000).is_err());
        assert!(LeapArrayAtomicU64::new(3, 1000).is_err());
    }

    #[test]
    fn time_idx() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        assert_eq!(arr.time2idx(1576296044907), 9);
        assert_eq!(arr.calculate_start_stamp(1576296044907), 1576296044500);
    }

    #[test]
    fn bucket_identity() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000u64;
        for offset in [0u64, 1, 499, 500, 801, 9999] {
            let t = now + offset;
            let bucket = arr.get_bucket_of_time(t).unwrap();
            let start = bucket.start_stamp();
            assert!(start <= t && t < start + BUCKET_LEN_MS as u64);
            assert_eq!(start % BUCKET_LEN_MS as u64, 0);
        }
    }

    #[test]
    fn start_time() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000;
        let bucket = arr.get_bucket_of_time(now + 801).unwrap();
        assert_eq!(bucket.start_stamp(), now + 500);
        assert!(Arc::ptr_eq(&bucket, arr.array.get(1).unwrap()));
    }

    #[test]
    fn deprecated() {
        let now = 1576296044907;
        let bucket = BucketWrap::<AtomicU64>::new(1576296004907);
        assert!(bucket.is_deprecated(now, INTERVAL_MS as u64));
    }

    #[test]
    fn recycle_stale_bucket() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000u64;
        let old = arr.get_bucket_of_time(now).unwrap();
        old.value().store(77, Ordering::SeqCst);
        // one full wrap-around later the same slot is recycled in place
        let wrapped = arr.get_bucket_of_time(now + INTERVAL_MS as u64).unwrap();
        assert!(Arc::ptr_eq(&old, &wrapped));
        assert_eq!(wrapped.start_stamp(), now + INTERVAL_MS as u64);
        assert_eq!(wrapped.value().load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clock_regression() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000u64;
        let installed = arr.get_bucket_of_time(now).unwrap();
        // the clock jumps back a full wrap: the ring must stay untouched
        let transient = arr.get_bucket_of_time(now - INTERVAL_MS as u64).unwrap();
        assert!(!Arc::ptr_eq(&installed, &transient));
        assert_eq!(installed.start_stamp(), now);
    }

    #[test]
    fn previous_bucket() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000u64;
        arr.get_bucket_of_time(now).unwrap();
        arr.get_bucket_of_time(now + 500).unwrap();
        let prev = arr.get_previous_bucket_of_time(now + 500).unwrap();
        assert_eq!(prev.start_stamp(), now);
    }

    #[test]
    fn valid_values() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000u64;
        let mut t = now;
        while t < now + INTERVAL_MS as u64 {
            arr.get_bucket_of_time(t).unwrap();
            t += BUCKET_LEN_MS as u64;
        }
        assert_eq!(arr.get_valid_values(now + 9999).len(), 20);
        // half of the ring expires after half an interval more
        assert_eq!(
            arr.get_valid_values(now + 9999 + (INTERVAL_MS / 2) as u64)
                .len(),
            10
        );
    }
}
