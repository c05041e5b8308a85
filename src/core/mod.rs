pub mod base;
// node graph, statistic preparation slots, statistic slot
pub mod stat;
// statistic slots
pub mod log;
// rule check slots
pub mod authority;
pub mod degrade;
pub mod flow;
pub mod system;
// cluster token service contracts
pub mod cluster;
pub mod config;

// rule registries are process-global, so tests touching them serialize on
// this lock
#[cfg(test)]
pub(crate) mod test_lock {
    use lazy_static::lazy_static;
    use std::sync::{Mutex, MutexGuard};

    lazy_static! {
        static ref RULE_TEST_LOCK: Mutex<()> = Mutex::new(());
    }

    pub(crate) fn guard() -> MutexGuard<'static, ()> {
        RULE_TEST_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
