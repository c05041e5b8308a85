use super::{BlockError, EntryContext, TokenResult, SLOT_INIT};
use crate::utils::AsAny;
use std::any::Any;
use std::sync::Arc;

/// trait `PartialOrd` is not object safe.
/// SlotChain sorts all its slots by ascending sort value in each bucket
/// (StatPrepareSlot bucket, RuleCheckSlot bucket and StatSlot bucket).
pub trait BaseSlot: Any + AsAny + Sync + Send {
    /// order returns the sort value of the slot.
    fn order(&self) -> u32 {
        0
    }
}

/// StatPrepareSlot is responsible for preparation before the statistics and
/// the rule checks, such as installing the call-tree node and the cluster
/// node for the current entry. The result of preparing is stored in the
/// EntryContext. All StatPrepareSlots execute in sequence; prepare must not
/// panic.
pub trait StatPrepareSlot: BaseSlot {
    fn prepare(&self, _ctx: &mut EntryContext) {}
}

/// RuleCheckSlot is a rule based checking strategy. Each check returns a
/// TokenResult; a blocked (or priority-wait) result breaks off the slot
/// pipeline.
pub trait RuleCheckSlot: BaseSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        ctx.result().clone()
    }
}

/// StatSlot is responsible for counting all custom metrics.
/// StatSlot does not handle any panic, and passes all panics up the chain.
pub trait StatSlot: BaseSlot {
    /// on_entry_pass is invoked when the StatPrepareSlots and
    /// RuleCheckSlots passed (including admissions after a wait).
    fn on_entry_pass(&self, _ctx: &EntryContext) {}
    /// on_entry_blocked is invoked when a RuleCheckSlot blocked the entry.
    /// The block error carries the block detail.
    fn on_entry_blocked(&self, _ctx: &EntryContext, _block_error: BlockError) {}
    /// on_completed is invoked when the chain exits.
    /// The semantics of on_completed is: the entry passed and completed.
    /// Note: blocked entries will not call this function.
    fn on_completed(&self, _ctx: &mut EntryContext) {}
}

/// SlotChain holds the ordered pipeline invoked per entry.
pub struct SlotChain {
    /// stat_pres is in ascending order by StatPrepareSlot.order() value.
    pub(self) stat_pres: Vec<Arc<dyn StatPrepareSlot>>,
    /// rule_checks is in ascending order by RuleCheckSlot.order() value.
    pub(self) rule_checks: Vec<Arc<dyn RuleCheckSlot>>,
    /// stats is in ascending order by StatSlot.order() value.
    pub(self) stats: Vec<Arc<dyn StatSlot>>,
}

impl Default for SlotChain {
    fn default() -> Self {
        Self {
            stat_pres: Vec::with_capacity(SLOT_INIT),
            rule_checks: Vec::with_capacity(SLOT_INIT),
            stats: Vec::with_capacity(SLOT_INIT),
        }
    }
}

impl SlotChain {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_stat_prepare_slot(&mut self, s: Arc<dyn StatPrepareSlot>) {
        self.stat_pres.push(s);
        self.stat_pres.sort_unstable_by_key(|a| a.order());
    }

    pub fn add_rule_check_slot(&mut self, s: Arc<dyn RuleCheckSlot>) {
        self.rule_checks.push(s);
        self.rule_checks.sort_unstable_by_key(|a| a.order());
    }

    pub fn add_stat_slot(&mut self, s: Arc<dyn StatSlot>) {
        self.stats.push(s);
        self.stats.sort_unstable_by_key(|a| a.order());
    }

    /// The entrance of the slot chain. Returns the TokenResult.
    pub fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        // execute prepare slots
        for s in &self.stat_pres {
            s.prepare(ctx);
        }

        // execute rule based checking slots
        ctx.reset_result_to_pass();
        for s in &self.rule_checks {
            let res = s.check(ctx);
            // a block or a priority wait breaks off the pipeline
            if res.is_blocked() || res.is_occupied_wait() {
                ctx.set_result(res);
                break;
            }
        }

        // execute statistic slots
        for s in &self.stats {
            if ctx.result().is_blocked() {
                // the block error is not none here
                s.on_entry_blocked(ctx, ctx.result().block_err().unwrap())
            } else {
                s.on_entry_pass(ctx)
            }
        }
        ctx.result().clone()
    }

    pub fn exit(&self, ctx: &mut EntryContext) {
        if ctx.is_blocked() {
            return;
        }
        // on_completed is called only when the entry passed
        for s in &self.stats {
            s.on_completed(ctx);
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::{BlockType, ResourceType, ResourceWrapper, FloodgateInput, TrafficType};
    use super::*;
    use crate::api::enter_context;
    use crate::api::exit_context;

    fn test_entry_ctx(res_name: &str) -> EntryContext {
        let ctx = enter_context(&format!("{}_ctx", res_name), "");
        let rw = ResourceWrapper::new(res_name.into(), ResourceType::Common, TrafficType::Inbound);
        let entry_ctx = EntryContext::new(rw, FloodgateInput::default(), ctx);
        exit_context();
        entry_ctx
    }

    // here we test the three kinds of slots one by one
    mod single {
        use super::*;

        struct StatPrepareSlotMock {
            pub(self) name: String,
            pub(self) order: u32,
        }
        impl BaseSlot for StatPrepareSlotMock {
            fn order(&self) -> u32 {
                self.order
            }
        }
        impl StatPrepareSlot for StatPrepareSlotMock {}

        #[test]
        fn add_stat_prepare_slot() {
            let mut sc = SlotChain::new();
            for base in &[2, 1, 3, 0, 4] {
                for i in 0..10 {
                    let order = base * 10 + i;
                    sc.add_stat_prepare_slot(Arc::new(StatPrepareSlotMock {
                        name: format!("mock{}", order),
                        order,
                    }))
                }
            }
            assert_eq!(sc.stat_pres.len(), 50);
            for (i, s) in sc.stat_pres.into_iter().enumerate() {
                assert_eq!(
                    s.clone()
                        .as_any_arc()
                        .downcast::<StatPrepareSlotMock>()
                        .unwrap()
                        .name,
                    format!("mock{}", i)
                );
            }
        }
    }

    pub(crate) mod aggregation {
        use super::*;
        use mockall::predicate::*;
        use mockall::*;

        // these signatures are necessary, don't remove them
        // because when using the macro `mock!`, we have to supply the
        // signatures expected to be mocked, otherwise we cannot call
        // `expect_xx()` on the mocked objects
        mock! {
            pub(crate) StatPrepareSlot {}
            impl BaseSlot for StatPrepareSlot {}
            impl StatPrepareSlot for StatPrepareSlot { fn prepare(&self, ctx: &mut EntryContext); }
        }

        mock! {
            pub(crate) RuleCheckSlot {}
            impl BaseSlot for RuleCheckSlot {}
            impl RuleCheckSlot for RuleCheckSlot { fn check(&self, ctx: &mut EntryContext) -> TokenResult; }
        }

        mock! {
            pub(crate) StatSlot {}
            impl BaseSlot for StatSlot {}
            impl StatSlot for StatSlot {
                fn on_entry_pass(&self, ctx: &EntryContext);
                fn on_entry_blocked(&self, ctx: &EntryContext, block_error: BlockError);
                fn on_completed(&self, ctx: &mut EntryContext);
            }
        }

        #[test]
        fn pass_and_exit() {
            let mut ps = Arc::new(MockStatPrepareSlot::new());
            let mut rcs1 = Arc::new(MockRuleCheckSlot::new());
            let mut rcs2 = Arc::new(MockRuleCheckSlot::new());
            let mut ssm = Arc::new(MockStatSlot::new());
            let mut seq = Sequence::new();
            Arc::get_mut(&mut ps)
                .unwrap()
                .expect_prepare()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut rcs1)
                .unwrap()
                .expect_check()
                .once()
                .in_sequence(&mut seq)
                .returning(|_ctx| TokenResult::new_pass());
            Arc::get_mut(&mut rcs2)
                .unwrap()
                .expect_check()
                .once()
                .in_sequence(&mut seq)
                .returning(|_ctx| TokenResult::new_pass());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_pass()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_blocked()
                .never()
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_completed()
                .once()
                .in_sequence(&mut seq)
                .return_const(());

            let mut sc = SlotChain::new();
            sc.add_stat_prepare_slot(ps.clone());
            sc.add_rule_check_slot(rcs1.clone());
            sc.add_rule_check_slot(rcs2.clone());
            sc.add_stat_slot(ssm.clone());

            let mut ctx = test_entry_ctx("slot_chain_pass_and_exit");
            let r = sc.entry(&mut ctx);
            assert!(!r.is_blocked(), "should pass but was blocked");
            sc.exit(&mut ctx);
        }

        #[test]
        fn block() {
            let mut ps = Arc::new(MockStatPrepareSlot::new());
            let mut rcs1 = Arc::new(MockRuleCheckSlot::new());
            let mut rcs2 = Arc::new(MockRuleCheckSlot::new());
            let mut ssm = Arc::new(MockStatSlot::new());

            let mut seq = Sequence::new();
            Arc::get_mut(&mut ps)
                .unwrap()
                .expect_prepare()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut rcs1)
                .unwrap()
                .expect_check()
                .once()
                .in_sequence(&mut seq)
                .returning(|_ctx| TokenResult::new_pass());
            Arc::get_mut(&mut rcs2)
                .unwrap()
                .expect_check()
                .once()
                .in_sequence(&mut seq)
                .returning(|_ctx| TokenResult::new_blocked(BlockType::Flow));
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_pass()
                .never()
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_blocked()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_completed()
                .never()
                .return_const(());

            let mut sc = SlotChain::new();
            sc.add_stat_prepare_slot(ps);
            sc.add_rule_check_slot(rcs1);
            sc.add_rule_check_slot(rcs2);
            sc.add_stat_slot(ssm);

            let mut ctx = test_entry_ctx("slot_chain_block");
            let r = sc.entry(&mut ctx);
            assert!(r.is_blocked(), "should be blocked but passed");
            assert_eq!(
                BlockType::Flow,
                r.block_err().unwrap().block_type(),
                "should be blocked by BlockType::Flow"
            );
            sc.exit(&mut ctx);
        }

        #[test]
        fn priority_wait_breaks_off() {
            let mut rcs1 = Arc::new(MockRuleCheckSlot::new());
            let mut rcs2 = Arc::new(MockRuleCheckSlot::new());
            let mut ssm = Arc::new(MockStatSlot::new());

            Arc::get_mut(&mut rcs1)
                .unwrap()
                .expect_check()
                .once()
                .returning(|_ctx| TokenResult::new_occupied_wait(100));
            // the second rule check must never run after a priority wait
            Arc::get_mut(&mut rcs2)
                .unwrap()
                .expect_check()
                .never()
                .returning(|_ctx| TokenResult::new_pass());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_pass()
                .once()
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_blocked()
                .never()
                .return_const(());

            let mut sc = SlotChain::new();
            sc.add_rule_check_slot(rcs1);
            sc.add_rule_check_slot(rcs2);
            sc.add_stat_slot(ssm);

            let mut ctx = test_entry_ctx("slot_chain_priority_wait");
            let r = sc.entry(&mut ctx);
            assert!(r.is_occupied_wait());
        }
    }
}
