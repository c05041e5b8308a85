//! Throttling indicates that pending requests will be throttled,
//! waiting in queue (until free capacity is available)

use super::{Checker, Controller};
use crate::base::{BlockType, StatNode, TokenResult};
use crate::utils;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, Weak,
};

static BLOCK_MSG_QUEUEING: &str = "flow throttling check blocked";

/// The leaky bucket: requests are spaced `1000 / threshold` milliseconds
/// apart; a request that would have to queue longer than
/// `max_queueing_time_ms` is rejected. `latest_passed_ms` is the virtual
/// pass time of the most recently admitted request.
#[derive(Debug)]
pub struct ThrottlingChecker {
    owner: Weak<Controller>,
    max_queueing_time_ms: i64,
    latest_passed_ms: AtomicI64,
}

impl ThrottlingChecker {
    pub fn new(owner: Weak<Controller>, max_queueing_time_ms: u32) -> Self {
        ThrottlingChecker {
            owner,
            max_queueing_time_ms: max_queueing_time_ms as i64,
            latest_passed_ms: AtomicI64::new(-1),
        }
    }
}

impl Checker for ThrottlingChecker {
    fn get_owner(&self) -> &Weak<Controller> {
        &self.owner
    }

    fn set_owner(&mut self, owner: Weak<Controller>) {
        self.owner = owner;
    }

    fn do_check(
        &self,
        _stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
        threshold: f64,
        _prioritized: bool,
    ) -> TokenResult {
        // Pass when the batch count is zero.
        if batch_count == 0 {
            return TokenResult::new_pass();
        }
        // Reject when the threshold is not positive, otherwise the cost
        // would overflow.
        if threshold <= 0.0 {
            let owner = self.owner.upgrade();
            return match owner {
                Some(owner) => TokenResult::new_blocked_with_cause(
                    BlockType::Flow,
                    BLOCK_MSG_QUEUEING.into(),
                    owner.rule().clone(),
                    Arc::new(threshold),
                ),
                None => {
                    TokenResult::new_blocked_with_msg(BlockType::Flow, BLOCK_MSG_QUEUEING.into())
                }
            };
        }

        // The interval between two consecutive admissions.
        let cost_ms = (1000.0 * batch_count as f64 / threshold).round() as i64;
        let now = utils::curr_time_millis() as i64;

        let last_passed = self.latest_passed_ms.load(Ordering::SeqCst);
        // Expected pass time of this request.
        let expected = last_passed + cost_ms;
        if expected <= now
            && self
                .latest_passed_ms
                .compare_exchange(last_passed, now, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
        {
            return TokenResult::new_pass();
        }

        // The bucket ran recently; this request has to queue.
        let estimated_wait = self.latest_passed_ms.load(Ordering::SeqCst) + cost_ms - now;
        if estimated_wait > self.max_queueing_time_ms {
            return TokenResult::new_blocked_with_msg(BlockType::Flow, BLOCK_MSG_QUEUEING.into());
        }

        // Claim the slot, then re-validate: a racing claimer may have
        // pushed the queue beyond the deadline, in which case the
        // speculative advance is rolled back.
        let expected = self.latest_passed_ms.fetch_add(cost_ms, Ordering::SeqCst) + cost_ms;
        let wait_ms = expected - utils::curr_time_millis() as i64;
        if wait_ms > self.max_queueing_time_ms {
            self.latest_passed_ms.fetch_sub(cost_ms, Ordering::SeqCst);
            return TokenResult::new_blocked_with_msg(BlockType::Flow, BLOCK_MSG_QUEUEING.into());
        }
        if wait_ms > 0 {
            TokenResult::new_should_wait(wait_ms as u64)
        } else {
            TokenResult::new_pass()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn zero_threshold_blocks() {
        let tc = ThrottlingChecker::new(Weak::new(), 1000);
        assert!(tc.do_check(None, 1, 0.0, false).is_blocked());
    }

    #[test]
    fn single_thread_no_queueing() {
        let threshold = 50.0;
        let tc = ThrottlingChecker::new(Weak::new(), 0);

        // The first request passes.
        assert!(tc.do_check(None, 1, threshold, false).is_pass());

        // Immediate retries have to queue, and the queue is forbidden.
        let req_count = 10;
        for _ in 0..req_count {
            assert!(tc.do_check(None, 1, threshold, false).is_blocked());
        }
        utils::sleep_for_ms((1000.0 / threshold) as u64 * req_count + 10);

        assert!(tc.do_check(None, 1, threshold, false).is_pass());
        assert!(tc.do_check(None, 1, threshold, false).is_blocked());
    }

    #[test]
    fn single_thread_queueing() {
        let threshold = 10.0; // one admission per 100 ms
        let timeout_ms = 250;
        let tc = ThrottlingChecker::new(Weak::new(), timeout_ms);

        assert!(tc.do_check(None, 1, threshold, false).is_pass());

        // the next two queue at ~100 and ~200 ms, the following exceed the
        // 250 ms deadline
        let r1 = tc.do_check(None, 1, threshold, false);
        assert!(r1.is_wait());
        assert!(r1.ms_to_wait() <= 100);
        let r2 = tc.do_check(None, 1, threshold, false);
        assert!(r2.is_wait());
        assert!(r2.ms_to_wait() > 100 && r2.ms_to_wait() <= 200);
        assert!(tc.do_check(None, 1, threshold, false).is_blocked());
    }

    #[test]
    fn parallel_queueing() {
        let threshold = 5.0; // one admission per 200 ms
        let timeout_ms = 2000; // room for 10 queued requests
        let tc = Arc::new(ThrottlingChecker::new(Weak::new(), timeout_ms));

        assert!(tc.do_check(None, 1, threshold, false).is_pass());
        let thread_num: u32 = 24;
        let mut handles = Vec::with_capacity(thread_num as usize);
        let wait_count = Arc::new(AtomicU32::new(0));
        let block_count = Arc::new(AtomicU32::new(0));
        for _ in 0..thread_num {
            let tc_clone = Arc::clone(&tc);
            let block_clone = Arc::clone(&block_count);
            let wait_clone = Arc::clone(&wait_count);
            handles.push(std::thread::spawn(move || {
                let res = tc_clone.do_check(None, 1, threshold, false);
                if res.is_blocked() {
                    block_clone.fetch_add(1, Ordering::SeqCst);
                } else if res.is_wait() {
                    wait_clone.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(
            thread_num,
            wait_count.load(Ordering::SeqCst) + block_count.load(Ordering::SeqCst)
        );
        const DELTA: u32 = 1;
        let waited = wait_count.load(Ordering::SeqCst);
        assert!(10 - DELTA <= waited && waited <= 10 + DELTA);
    }
}
