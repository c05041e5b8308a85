pub mod array_metric;
pub mod leap_array;
pub mod metric_bucket;
pub mod occupy;

pub use array_metric::*;
pub use leap_array::*;
pub use metric_bucket::*;
pub use occupy::*;

/// a specialization of `LeapArray<T>` with `MetricBucket`
pub type BucketLeapArray = LeapArray<MetricBucket>;
/// the second-grained variant carrying a future ring
pub type OccupiableBucketLeapArray = OccupiableLeapArray<MetricBucket>;
