//! Stat
//!
use crate::utils::AsAny;
use crate::{Error, Result};
use enum_map::Enum;
use std::fmt;

/// The metric events recorded per call outcome.
/// `pass + block == total`; `Complete` counts finished (exited) calls and
/// carries the response-time sum in `Rt`; `Error` counts business errors;
/// `OccupiedPass` marks passes that were pre-booked from a future window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum MetricEvent {
    Pass,
    Block,
    Complete,
    Error,
    Rt,
    OccupiedPass,
}

pub(crate) const ILLEGAL_STATISTIC_PARAMS_ERROR: &str =
    "Invalid parameters, sample_count or interval_ms, for statistic structure";

pub fn check_validity_for_statistic(sample_count: u32, interval_ms: u32) -> Result<()> {
    if interval_ms == 0 || sample_count == 0 || interval_ms % sample_count != 0 {
        return Err(Error::msg(ILLEGAL_STATISTIC_PARAMS_ERROR));
    }
    Ok(())
}

/// Read access to the second-grained and minute-grained metrics of a node.
pub trait ReadStat: Send + Sync {
    /// per-second rate of the event over the second-grained window
    fn qps(&self, event: MetricEvent) -> f64;
    /// rate of the event in the previous one-second bucket of the
    /// minute-grained window
    fn qps_previous(&self, event: MetricEvent) -> f64;
    /// sum of the event over the second-grained window
    fn sum(&self, event: MetricEvent) -> u64;
    /// sum of the event over the minute-grained window
    fn total(&self, event: MetricEvent) -> u64;
    fn min_rt(&self) -> f64;
    fn avg_rt(&self) -> f64;
}

/// Write access to the metrics of a node.
pub trait WriteStat: Send + Sync {
    fn add_count(&self, event: MetricEvent, count: u64);
}

/// The live concurrency gauge of a node.
pub trait ConcurrencyStat: Send + Sync {
    fn current_concurrency(&self) -> u32;
    fn increase_concurrency(&self);
    fn decrease_concurrency(&self);
}

/// Pre-booking tokens of upcoming statistic windows for prioritized
/// requests.
pub trait OccupySupport: Send + Sync {
    /// Probe the earliest upcoming window whose budget still admits
    /// `acquire_count` more tokens. Returns the wait in milliseconds until
    /// that window starts, or the configured occupy timeout when no window
    /// within the timeout admits the request.
    fn try_occupy_next(&self, now: u64, acquire_count: u32, threshold: f64) -> u64;
    /// Tokens already booked into upcoming windows.
    fn waiting(&self) -> u64;
    /// Book `acquire_count` tokens into the window containing `future_time`.
    fn add_waiting_request(&self, future_time: u64, acquire_count: u32);
    /// Record an admission paid from a future window.
    fn add_occupied_pass(&self, acquire_count: u32);
}

/// StatNode holds real-time statistics for a resource.
pub trait StatNode:
    ReadStat + WriteStat + ConcurrencyStat + OccupySupport + AsAny + fmt::Debug
{
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid() {
        check_validity_for_statistic(2, 1000).unwrap();
        check_validity_for_statistic(60, 60000).unwrap();
    }

    #[test]
    fn invalid() {
        assert!(check_validity_for_statistic(0, 1000).is_err());
        assert!(check_validity_for_statistic(2, 0).is_err());
        assert!(check_validity_for_statistic(3, 1000).is_err());
    }
}
