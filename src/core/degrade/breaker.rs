use super::{Rule, Strategy};
use crate::base::{MetricEvent, ReadStat};
use crate::core::stat;
use crate::utils::curr_time_millis;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// The per-rule runtime of a degrade rule: `cut` marks the open state,
/// `pass_count` counts consecutive slow requests under the AvgRt strategy.
/// While cut, every call on the resource is rejected; a scheduled reset
/// clears the state after the rule's recovery timeout.
#[derive(Debug)]
pub struct Breaker {
    rule: Arc<Rule>,
    cut: AtomicBool,
    pass_count: AtomicU64,
}

impl Breaker {
    pub fn new(rule: Arc<Rule>) -> Self {
        Breaker {
            rule,
            cut: AtomicBool::new(false),
            pass_count: AtomicU64::new(0),
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn is_cut(&self) -> bool {
        self.cut.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.pass_count.store(0, Ordering::SeqCst);
        self.cut.store(false, Ordering::SeqCst);
    }

    /// Decide admission against the resource's cluster-wide metrics. The
    /// first caller observing a tripping condition flips `cut` and
    /// schedules the recovery.
    pub fn try_pass(self: &Arc<Self>) -> bool {
        if self.cut.load(Ordering::SeqCst) {
            return false;
        }
        let cluster_node = match stat::get_cluster_node(&self.rule.resource) {
            Some(node) => node,
            None => return true,
        };

        match self.rule.strategy {
            Strategy::AvgRt => {
                let rt = cluster_node.stat().avg_rt();
                if rt < self.rule.threshold {
                    self.pass_count.store(0, Ordering::SeqCst);
                    return true;
                }
                // degrade only after enough consecutive slow requests
                if self.pass_count.fetch_add(1, Ordering::SeqCst) + 1
                    < self.rule.rt_slow_request_amount
                {
                    return true;
                }
            }
            Strategy::ErrorRatio => {
                let error = cluster_node.stat().error_qps();
                let complete = cluster_node.stat().complete_qps();
                let total = cluster_node.stat().total_qps();
                if total < self.rule.min_request_amount as f64 {
                    return true;
                }
                // in the same aligned window, completions cover both
                // errors and real successes
                let real_success = complete - error;
                if real_success <= 0.0 && error < self.rule.min_request_amount as f64 {
                    return true;
                }
                if error / complete < self.rule.threshold {
                    return true;
                }
            }
            Strategy::ErrorCount => {
                let error_total = cluster_node.stat().total(MetricEvent::Error) as f64;
                if error_total < self.rule.threshold {
                    return true;
                }
            }
        }

        if self
            .cut
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            let breaker = Arc::clone(self);
            reset_scheduler().schedule(
                self.rule.retry_timeout_sec as u64 * 1000,
                Box::new(move || breaker.reset()),
            );
        }
        false
    }
}

type ResetJob = Box<dyn FnOnce() + Send>;

struct ScheduledReset {
    deadline_ms: u64,
    seq: u64,
    job: ResetJob,
}

impl PartialEq for ScheduledReset {
    fn eq(&self, other: &Self) -> bool {
        self.deadline_ms == other.deadline_ms && self.seq == other.seq
    }
}
impl Eq for ScheduledReset {}
impl PartialOrd for ScheduledReset {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduledReset {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline_ms, self.seq).cmp(&(other.deadline_ms, other.seq))
    }
}

/// A shared delay queue running breaker resets: worker threads (one per
/// available core) sleep until the earliest deadline and run due jobs.
pub struct ResetScheduler {
    queue: Mutex<BinaryHeap<Reverse<ScheduledReset>>>,
    available: Condvar,
    seq: AtomicU64,
}

impl ResetScheduler {
    fn new() -> Arc<Self> {
        let scheduler = Arc::new(ResetScheduler {
            queue: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
            seq: AtomicU64::new(0),
        });
        let workers = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1);
        for _ in 0..workers {
            let scheduler = Arc::clone(&scheduler);
            std::thread::spawn(move || scheduler.run());
        }
        scheduler
    }

    pub fn schedule(&self, delay_ms: u64, job: ResetJob) {
        let task = ScheduledReset {
            deadline_ms: curr_time_millis() + delay_ms,
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            job,
        };
        self.queue.lock().unwrap().push(Reverse(task));
        self.available.notify_one();
    }

    fn run(&self) {
        let mut queue = self.queue.lock().unwrap();
        loop {
            match queue.peek() {
                None => {
                    queue = self.available.wait(queue).unwrap();
                }
                Some(Reverse(task)) => {
                    let now = curr_time_millis();
                    if task.deadline_ms <= now {
                        let Reverse(task) = queue.pop().unwrap();
                        drop(queue);
                        (task.job)();
                        queue = self.queue.lock().unwrap();
                    } else {
                        let timeout = std::time::Duration::from_millis(task.deadline_ms - now);
                        let (guard, _) = self.available.wait_timeout(queue, timeout).unwrap();
                        queue = guard;
                    }
                }
            }
        }
    }
}

pub fn reset_scheduler() -> Arc<ResetScheduler> {
    use lazy_static::lazy_static;
    lazy_static! {
        static ref RESET_SCHEDULER: Arc<ResetScheduler> = ResetScheduler::new();
    }
    RESET_SCHEDULER.clone()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ResourceType, ResourceWrapper, TrafficType, WriteStat};
    use crate::stat::get_or_create_cluster_node;
    use crate::utils::sleep_for_ms;
    use std::sync::atomic::AtomicU32;

    fn cluster_node_for(res: &str) -> Arc<crate::stat::ClusterNode> {
        get_or_create_cluster_node(&ResourceWrapper::new(
            res.into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ))
    }

    #[test]
    fn scheduler_runs_due_jobs() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        reset_scheduler().schedule(50, Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        sleep_for_ms(150);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_cluster_node_passes() {
        let breaker = Arc::new(Breaker::new(Arc::new(Rule {
            resource: "degrade_breaker_missing_node".into(),
            retry_timeout_sec: 1,
            ..Default::default()
        })));
        assert!(breaker.try_pass());
    }

    #[test]
    fn error_ratio_trips_and_recovers() {
        let res = "degrade_breaker_error_ratio";
        let node = cluster_node_for(res);
        let breaker = Arc::new(Breaker::new(Arc::new(Rule {
            resource: res.into(),
            strategy: Strategy::ErrorRatio,
            threshold: 0.5,
            retry_timeout_sec: 1,
            min_request_amount: 5,
            ..Default::default()
        })));

        // 4 errors and 1 real success within the same second
        node.add_count(MetricEvent::Pass, 5);
        node.add_count(MetricEvent::Complete, 5);
        node.add_count(MetricEvent::Error, 4);

        assert!(!breaker.try_pass());
        assert!(breaker.is_cut());
        // while open, every call is rejected
        assert!(!breaker.try_pass());

        sleep_for_ms(1200);
        assert!(!breaker.is_cut());
    }

    #[test]
    fn error_ratio_needs_min_requests() {
        let res = "degrade_breaker_min_amount";
        let node = cluster_node_for(res);
        let breaker = Arc::new(Breaker::new(Arc::new(Rule {
            resource: res.into(),
            strategy: Strategy::ErrorRatio,
            threshold: 0.5,
            retry_timeout_sec: 1,
            min_request_amount: 5,
            ..Default::default()
        })));
        // 2 requests only: below the minimum
        node.add_count(MetricEvent::Pass, 2);
        node.add_count(MetricEvent::Complete, 2);
        node.add_count(MetricEvent::Error, 2);
        assert!(breaker.try_pass());
    }

    #[test]
    fn error_count_trips() {
        let res = "degrade_breaker_error_count";
        let node = cluster_node_for(res);
        let breaker = Arc::new(Breaker::new(Arc::new(Rule {
            resource: res.into(),
            strategy: Strategy::ErrorCount,
            threshold: 3.0,
            retry_timeout_sec: 1,
            ..Default::default()
        })));
        node.add_count(MetricEvent::Error, 2);
        assert!(breaker.try_pass());
        node.add_count(MetricEvent::Error, 1);
        assert!(!breaker.try_pass());
    }

    #[test]
    fn avg_rt_needs_consecutive_slow_requests() {
        let res = "degrade_breaker_avg_rt";
        let node = cluster_node_for(res);
        let breaker = Arc::new(Breaker::new(Arc::new(Rule {
            resource: res.into(),
            strategy: Strategy::AvgRt,
            threshold: 50.0,
            retry_timeout_sec: 1,
            rt_slow_request_amount: 3,
            ..Default::default()
        })));
        // avg rt = 100ms, above the 50ms threshold
        node.add_count(MetricEvent::Complete, 1);
        node.add_count(MetricEvent::Rt, 100);
        assert!(breaker.try_pass());
        assert!(breaker.try_pass());
        // the third consecutive slow request trips the rule
        assert!(!breaker.try_pass());
        assert!(breaker.is_cut());
    }
}
