use super::context::{current_context, enter_default_context};
use super::slot_chain::get_or_create_chain;
use crate::base::{
    EntryContext, EntryStrongPtr, MetricEvent, ParamsList, ResourceType, ResourceWrapper,
    FloodgateEntry, FloodgateInput, SlotChain, TokenResult, TrafficType, WriteStat,
};
use crate::core::stat;
use crate::{config, Error, Result};
use std::sync::{Arc, RwLock};

/// EntryBuilder is the basic API: it brackets a unit of protected work.
pub struct EntryBuilder {
    resource_name: String,
    resource_type: ResourceType,
    traffic_type: TrafficType,
    batch_count: u32,
    prioritized: bool,
    args: Option<ParamsList>,
}

impl EntryBuilder {
    pub fn new(resource_name: String) -> Self {
        EntryBuilder {
            resource_name,
            resource_type: ResourceType::default(),
            traffic_type: TrafficType::default(),
            batch_count: 1,
            prioritized: false,
            args: None,
        }
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_traffic_type(mut self, traffic_type: TrafficType) -> Self {
        self.traffic_type = traffic_type;
        self
    }

    pub fn with_batch_count(mut self, batch_count: u32) -> Self {
        self.batch_count = batch_count;
        self
    }

    pub fn with_prioritized(mut self, prioritized: bool) -> Self {
        self.prioritized = prioritized;
        self
    }

    pub fn with_args(mut self, args: Option<ParamsList>) -> Self {
        self.args = args;
        self
    }

    /// `build()` consumes the EntryBuilder. A blocked check surfaces as an
    /// error; the entry was already released in that case and must not be
    /// exited by the caller.
    pub fn build(self) -> Result<EntryStrongPtr> {
        self.do_build(false)
    }

    /// Like `build()`, but the returned entry is detached from the calling
    /// task's entry stack: the synchronous call stack continues unaffected
    /// while the asynchronous work completes, and the entry must be exited
    /// explicitly, possibly from another task.
    pub fn build_async(self) -> Result<EntryStrongPtr> {
        self.do_build(true)
    }

    fn do_build(self, detached: bool) -> Result<EntryStrongPtr> {
        let call_ctx = current_context().unwrap_or_else(enter_default_context);

        // the master switch, the null context and the chain cap all bypass
        // checking rather than failing the call
        let chain: Option<Arc<SlotChain>> =
            if !config::enabled() || call_ctx.read().unwrap().is_null() {
                None
            } else {
                get_or_create_chain(&self.resource_name)
            };

        let resource = ResourceWrapper::new(
            self.resource_name,
            self.resource_type,
            self.traffic_type,
        );
        let mut input = FloodgateInput::new(self.batch_count, self.prioritized);
        if let Some(args) = self.args {
            input.set_args(args);
        }

        let parent = call_ctx.read().unwrap().cur_entry().cloned();
        let parent_node = parent
            .as_ref()
            .and_then(|p| p.read().unwrap().context().cur_node());
        let mut entry_ctx = EntryContext::new(resource, input, call_ctx.clone());
        entry_ctx.set_parent_node(parent_node);

        let entry = Arc::new(RwLock::new(FloodgateEntry::new(
            entry_ctx,
            chain.clone(),
            parent.clone(),
        )));
        if let Some(p) = &parent {
            p.write().unwrap().set_child(Arc::downgrade(&entry));
        }
        call_ctx.write().unwrap().set_cur_entry(Some(entry.clone()));

        let r = match &chain {
            Some(sc) => {
                let mut e = entry.write().unwrap();
                sc.entry(e.context_mut())
            }
            None => TokenResult::new_pass(),
        };

        let handle = EntryStrongPtr::new(entry);
        if r.is_blocked() {
            // release immediately so the stack and counters stay balanced
            handle.exit()?;
            return Err(Error::msg(r.to_string()));
        }
        if detached {
            handle.inner().write().unwrap().set_detached();
            call_ctx.write().unwrap().set_cur_entry(parent.clone());
            match &parent {
                Some(p) => p.write().unwrap().clear_child(),
                None => super::context::exit_default_context(&call_ctx),
            }
        }
        Ok(handle)
    }
}

/// Records a business error of an in-flight entry: the error counters of
/// the entry's nodes move immediately. The entry still completes normally
/// on exit, so within one window `complete == errors + real successes`.
pub fn trace_error(entry: &EntryStrongPtr, _err: Error) {
    let e = entry.inner().read().unwrap();
    if e.is_exited() {
        return;
    }
    let count = e.context().input().batch_count() as u64;
    if let Some(node) = e.context().cur_node() {
        node.add_count(MetricEvent::Error, count);
    }
    if let Some(origin) = e.context().origin_node() {
        origin.add_count(MetricEvent::Error, count);
    }
    if *e.context().resource().traffic_type() == TrafficType::Inbound {
        stat::inbound_node().add_count(MetricEvent::Error, count);
    }
}

#[cfg(test)]
mod test {
    use super::super::context::{enter_context, exit_context};
    use super::*;
    use crate::base::{ConcurrencyStat, ReadStat};

    #[test]
    fn entry_without_rules_passes() {
        let entry = EntryBuilder::new("api_entry_plain".into())
            .with_traffic_type(TrafficType::Outbound)
            .build()
            .unwrap();
        let node = entry.cur_node().unwrap();
        assert_eq!(node.sum(MetricEvent::Pass), 1);
        assert_eq!(node.current_concurrency(), 1);
        entry.exit().unwrap();
        assert_eq!(node.current_concurrency(), 0);
        assert_eq!(node.sum(MetricEvent::Complete), 1);
    }

    #[test]
    fn implicit_default_context_released() {
        let entry = EntryBuilder::new("api_entry_default_ctx".into())
            .build()
            .unwrap();
        assert!(current_context().is_some());
        entry.exit().unwrap();
        assert!(current_context().is_none());
    }

    #[test]
    fn async_entry_detaches_from_stack() {
        let ctx = enter_context("api_entry_async_ctx", "");
        let outer = EntryBuilder::new("api_entry_async_outer".into())
            .build()
            .unwrap();
        let detached = EntryBuilder::new("api_entry_async_inner".into())
            .build_async()
            .unwrap();
        // the synchronous stack still points at the outer entry
        let cur = ctx.read().unwrap().cur_entry().cloned().unwrap();
        assert!(Arc::ptr_eq(&cur, outer.inner()));
        // the outer entry can exit before the asynchronous work finishes
        outer.exit().unwrap();
        let node = detached.cur_node().unwrap();
        assert_eq!(node.current_concurrency(), 1);
        detached.exit().unwrap();
        assert_eq!(node.current_concurrency(), 0);
        exit_context();
    }

    #[test]
    fn trace_error_counts_errors() {
        let entry = EntryBuilder::new("api_entry_trace_error".into())
            .with_traffic_type(TrafficType::Outbound)
            .build()
            .unwrap();
        let node = entry.cur_node().unwrap();
        trace_error(&entry, Error::msg("business failure"));
        entry.exit().unwrap();
        assert_eq!(node.sum(MetricEvent::Error), 1);
        // the errored call still completes, so complete covers it
        assert_eq!(node.sum(MetricEvent::Complete), 1);
        assert_eq!(node.current_concurrency(), 0);
    }
}
