use crate::base::{BaseSlot, BlockError, EntryContext, StatSlot};
use crate::logging;
use lazy_static::lazy_static;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 2000;

lazy_static! {
    pub static ref DEFAULT_LOG_SLOT: Arc<Slot> = Arc::new(Slot {});
}

pub fn default_log_slot() -> Arc<Slot> {
    DEFAULT_LOG_SLOT.clone()
}

/// Emits one log line per blocked entry, after the statistic slot recorded
/// the block.
pub struct Slot {}

impl BaseSlot for Slot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for Slot {
    fn on_entry_pass(&self, _ctx: &EntryContext) {}

    fn on_entry_blocked(&self, ctx: &EntryContext, block_error: BlockError) {
        logging::warn!(
            "[BlockLog] resource: {}, context: {}, origin: {}, reason: {}",
            ctx.resource().name(),
            ctx.call_ctx().read().unwrap().name(),
            ctx.call_ctx().read().unwrap().origin(),
            block_error
        );
    }

    fn on_completed(&self, _ctx: &mut EntryContext) {}
}
