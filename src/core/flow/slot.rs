use super::{checker, get_traffic_controller_list_for};
use crate::base::{BaseSlot, EntryContext, RuleCheckSlot, TokenResult};
use crate::utils;
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 3000;

/// The rule-check slot applying the flow rules of the resource. A wait
/// result suspends the calling task for the carried duration: a throttling
/// wait then proceeds as an ordinary pass, a priority wait terminates the
/// rule checks with the occupied-pass accounting.
pub struct Slot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<Slot> = Arc::new(Slot {});
}

pub fn default_slot() -> Arc<Slot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for Slot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for Slot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        let res = ctx.resource().name().clone();
        if res.is_empty() {
            return ctx.result().clone();
        }
        for tc in get_traffic_controller_list_for(&res) {
            let r = checker::can_pass_check(&tc, ctx);
            match r {
                TokenResult::Pass => {}
                TokenResult::Blocked(_) => {
                    ctx.set_result(r);
                    break;
                }
                TokenResult::Wait(ms) => {
                    utils::sleep_for_ms(ms);
                }
                TokenResult::OccupiedWait(ms) => {
                    utils::sleep_for_ms(ms);
                    ctx.set_result(r);
                    break;
                }
            }
        }
        ctx.result().clone()
    }
}
