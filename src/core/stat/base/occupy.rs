//! "Borrow from the future" support for the leap array.
//!
//! A prioritized request whose current window is exhausted may book tokens
//! of an upcoming window: the booking lands in a *future* ring with the
//! same geometry as the primary one, and when the booked window becomes
//! current, the primary bucket is seeded with the booked count.

use super::{BucketWrap, LeapArray, MetricTrait};
use crate::Result;
use std::sync::Arc;

/// A bucket type whose bookings can be migrated between rings.
pub trait OccupySeed: MetricTrait {
    /// tokens booked in this (future) bucket
    fn booked(&self) -> u64;
    /// record `count` booked tokens
    fn book(&self, count: u64);
    /// seed a fresh primary bucket from the matching future bucket
    fn carry_over(&self, future: &Self);
}

/// A leap array indexed by future timestamps. Buckets are deprecated when
/// they are no longer in the future, the mirror of the primary ring's rule.
#[derive(Debug)]
pub struct FutureLeapArray<T: OccupySeed> {
    inner: LeapArray<T>,
}

impl<T: OccupySeed> FutureLeapArray<T> {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        Ok(FutureLeapArray {
            inner: LeapArray::new(sample_count, interval_ms)?,
        })
    }

    pub fn get_bucket_of_time(&self, future_time: u64) -> Result<Arc<BucketWrap<T>>> {
        self.inner.get_bucket_of_time(future_time)
    }

    /// The bucket installed for exactly the interval containing `time`.
    pub fn get_window_value(&self, time: u64) -> Option<Arc<BucketWrap<T>>> {
        self.inner.get_window_value(time)
    }

    /// All buckets still strictly in the future at `now`.
    pub fn future_values(&self, now: u64) -> Vec<Arc<BucketWrap<T>>> {
        let mut res = Vec::new();
        for bucket in &self.inner.array {
            if bucket.start_stamp() > now {
                res.push(bucket.clone());
            }
        }
        res
    }
}

/// A leap array composed with a future ring of identical geometry. When a
/// primary bucket is created or recycled at time `t`, the pass count booked
/// into the future ring for `t`'s window is carried into it.
#[derive(Debug)]
pub struct OccupiableLeapArray<T: OccupySeed> {
    primary: LeapArray<T>,
    borrow: FutureLeapArray<T>,
}

impl<T: OccupySeed> OccupiableLeapArray<T> {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        Ok(OccupiableLeapArray {
            primary: LeapArray::new(sample_count, interval_ms)?,
            borrow: FutureLeapArray::new(sample_count, interval_ms)?,
        })
    }

    pub fn primary(&self) -> &LeapArray<T> {
        &self.primary
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.primary.bucket_len_ms()
    }

    pub fn get_bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<T>>> {
        let borrow = &self.borrow;
        self.primary.get_bucket_of_time_seeded(now, &move |fresh: &T| {
            if let Some(booked) = borrow.get_window_value(now) {
                fresh.carry_over(booked.value());
            }
        })
    }

    /// Book `count` tokens into the future ring's window containing
    /// `future_time`.
    pub fn add_waiting(&self, future_time: u64, count: u64) -> Result<()> {
        let bucket = self.borrow.get_bucket_of_time(future_time)?;
        bucket.value().book(count);
        Ok(())
    }

    /// Sum of tokens booked into windows still ahead of `now`.
    pub fn current_waiting(&self, now: u64) -> u64 {
        let mut waiting = 0;
        for bucket in self.borrow.future_values(now) {
            waiting += bucket.value().booked();
        }
        waiting
    }
}
