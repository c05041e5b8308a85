use super::inbound_node;
use crate::base::{
    BaseSlot, BlockError, ConcurrencyStat, EntryContext, MetricEvent, StatSlot, TrafficType,
    WriteStat,
};
use crate::config;
use crate::utils::curr_time_millis;
use lazy_static::lazy_static;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 1000;

lazy_static! {
    pub static ref DEFAULT_STATISTIC_SLOT: Arc<StatisticSlot> = Arc::new(StatisticSlot {});
}

pub fn default_statistic_slot() -> Arc<StatisticSlot> {
    DEFAULT_STATISTIC_SLOT.clone()
}

/// Records the outcome of every entry on three levels: the call-tree node
/// (which propagates into the resource's ClusterNode), the caller-origin
/// node, and the global inbound node for inbound resources. Recording
/// happens after the rule checks resolved, so the deciding slots never read
/// counters of the call they are deciding.
pub struct StatisticSlot {}

fn record_pass_for<N>(node: &N, count: u64)
where
    N: ConcurrencyStat + WriteStat + ?Sized,
{
    node.increase_concurrency();
    node.add_count(MetricEvent::Pass, count);
}

fn record_priority_wait_for<N>(node: &N)
where
    N: ConcurrencyStat + ?Sized,
{
    // the pass count was pre-paid into the future bucket
    node.increase_concurrency();
}

fn record_block_for<N>(node: &N, count: u64)
where
    N: WriteStat + ?Sized,
{
    node.add_count(MetricEvent::Block, count);
}

fn record_complete_for<N>(node: &N, count: u64, round_trip: u64)
where
    N: ConcurrencyStat + WriteStat + ?Sized,
{
    node.add_count(MetricEvent::Rt, round_trip);
    node.add_count(MetricEvent::Complete, count);
    node.decrease_concurrency();
}

impl BaseSlot for StatisticSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for StatisticSlot {
    fn on_entry_pass(&self, ctx: &EntryContext) {
        let count = ctx.input().batch_count() as u64;
        let inbound = *ctx.resource().traffic_type() == TrafficType::Inbound;
        if ctx.result().is_occupied_wait() {
            if let Some(node) = ctx.cur_node() {
                record_priority_wait_for(&*node);
            }
            if let Some(origin) = ctx.origin_node() {
                record_priority_wait_for(&*origin);
            }
            if inbound {
                record_priority_wait_for(&*inbound_node());
            }
            return;
        }
        if let Some(node) = ctx.cur_node() {
            record_pass_for(&*node, count);
        }
        if let Some(origin) = ctx.origin_node() {
            record_pass_for(&*origin, count);
        }
        if inbound {
            record_pass_for(&*inbound_node(), count);
        }
    }

    fn on_entry_blocked(&self, ctx: &EntryContext, _block_error: BlockError) {
        let count = ctx.input().batch_count() as u64;
        if let Some(node) = ctx.cur_node() {
            record_block_for(&*node, count);
        }
        if let Some(origin) = ctx.origin_node() {
            record_block_for(&*origin, count);
        }
        if *ctx.resource().traffic_type() == TrafficType::Inbound {
            record_block_for(&*inbound_node(), count);
        }
    }

    fn on_completed(&self, ctx: &mut EntryContext) {
        let count = ctx.input().batch_count() as u64;
        let inbound = *ctx.resource().traffic_type() == TrafficType::Inbound;
        let mut round_trip = curr_time_millis().saturating_sub(ctx.start_time());
        let max_rt = config::statistic_max_rt();
        if round_trip > max_rt {
            round_trip = max_rt;
        }
        ctx.set_round_trip(round_trip);
        if ctx.get_err().is_none() {
            if let Some(node) = ctx.cur_node() {
                record_complete_for(&*node, count, round_trip);
            }
            if let Some(origin) = ctx.origin_node() {
                record_complete_for(&*origin, count, round_trip);
            }
            if inbound {
                record_complete_for(&*inbound_node(), count, round_trip);
            }
        } else {
            // business errors are counted at trace time; the concurrency
            // gauge must still come back down on this exit path
            if let Some(node) = ctx.cur_node() {
                node.decrease_concurrency();
            }
            if let Some(origin) = ctx.origin_node() {
                origin.decrease_concurrency();
            }
            if inbound {
                inbound_node().decrease_concurrency();
            }
        }
    }
}
