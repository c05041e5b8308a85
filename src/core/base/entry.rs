use super::{EntryContext, SlotChain};
use crate::core::stat::{DefaultNode, StatisticNode};
use crate::{Error, Result};
use std::sync::{Arc, RwLock, Weak};

pub type EntryInnerPtr = Arc<RwLock<FloodgateEntry>>;
pub type EntryWeakPtr = Weak<RwLock<FloodgateEntry>>;

/// A single in-flight admission. Entries of one task form a doubly-linked
/// call stack under the task's context: `parent` points at the enclosing
/// entry, `child` at the nested one.
pub struct FloodgateEntry {
    ctx: EntryContext,
    /// each entry traverses a slot chain; `None` marks a pass-through entry
    /// (library disabled, null context, or the chain cap was reached)
    sc: Option<Arc<SlotChain>>,
    parent: Option<EntryInnerPtr>,
    child: Option<EntryWeakPtr>,
    /// detached (async) entries do not participate in the context stack
    detached: bool,
    exited: bool,
}

impl FloodgateEntry {
    pub fn new(ctx: EntryContext, sc: Option<Arc<SlotChain>>, parent: Option<EntryInnerPtr>) -> Self {
        FloodgateEntry {
            ctx,
            sc,
            parent,
            child: None,
            detached: false,
            exited: false,
        }
    }

    pub fn context(&self) -> &EntryContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut EntryContext {
        &mut self.ctx
    }

    pub fn parent(&self) -> Option<&EntryInnerPtr> {
        self.parent.as_ref()
    }

    pub fn set_child(&mut self, child: EntryWeakPtr) {
        self.child = Some(child);
    }

    pub fn clear_child(&mut self) {
        self.child = None;
    }

    pub(crate) fn set_detached(&mut self) {
        self.detached = true;
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub fn set_err(&mut self, err: Error) {
        self.ctx.set_err(err);
    }
}

/// `exit_single` releases one entry: it runs the stat slots' completion
/// callbacks and pops the entry from its context stack. Repeated calls are
/// no-ops.
pub(crate) fn exit_single(entry: &EntryInnerPtr) {
    let (call_ctx, parent, detached) = {
        let mut e = entry.write().unwrap();
        if e.exited {
            return;
        }
        e.exited = true;
        if let Some(sc) = e.sc.clone() {
            sc.exit(&mut e.ctx);
        }
        (e.ctx.call_ctx().clone(), e.parent.take(), e.detached)
    };
    if detached {
        return;
    }
    call_ctx.write().unwrap().set_cur_entry(parent.clone());
    match parent {
        Some(p) => p.write().unwrap().clear_child(),
        None => crate::api::context::exit_default_context(&call_ctx),
    }
}

/// The entry handle returned to callers.
pub struct EntryStrongPtr(EntryInnerPtr);

impl EntryStrongPtr {
    pub fn new(entry: EntryInnerPtr) -> EntryStrongPtr {
        EntryStrongPtr(entry)
    }

    pub(crate) fn inner(&self) -> &EntryInnerPtr {
        &self.0
    }

    pub fn set_err(&self, err: Error) {
        self.0.write().unwrap().set_err(err);
    }

    pub fn is_exited(&self) -> bool {
        self.0.read().unwrap().is_exited()
    }

    pub fn cur_node(&self) -> Option<Arc<DefaultNode>> {
        self.0.read().unwrap().context().cur_node()
    }

    pub fn origin_node(&self) -> Option<Arc<StatisticNode>> {
        self.0.read().unwrap().context().origin_node()
    }

    /// Releases the entry. Entries must be exited in LIFO order within
    /// their context: exiting an entry that is not the innermost one first
    /// force-unwinds every entry above it (so all counters stay balanced)
    /// and then reports the pairing violation.
    pub fn exit(&self) -> Result<()> {
        let (call_ctx, exited, detached, res_name) = {
            let e = self.0.read().unwrap();
            (
                e.ctx.call_ctx().clone(),
                e.exited,
                e.detached,
                e.ctx.resource().name().clone(),
            )
        };
        if exited {
            return Ok(());
        }
        if detached {
            exit_single(&self.0);
            return Ok(());
        }
        let cur = call_ctx.read().unwrap().cur_entry().cloned();
        match cur {
            Some(c) if Arc::ptr_eq(&c, &self.0) => {
                exit_single(&self.0);
                Ok(())
            }
            _ => {
                let mut exited_self = false;
                loop {
                    let top = call_ctx.read().unwrap().cur_entry().cloned();
                    match top {
                        None => break,
                        Some(t) => {
                            let is_self = Arc::ptr_eq(&t, &self.0);
                            exit_single(&t);
                            if is_self {
                                exited_self = true;
                                break;
                            }
                        }
                    }
                }
                if !exited_self {
                    // the entry was not on the stack any more; release its
                    // own bookkeeping regardless
                    exit_single(&self.0);
                }
                Err(Error::msg(format!(
                    "the order of entry exit cannot be paired with the order of entry, resource: {}",
                    res_name
                )))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::{enter_context, exit_context};
    use crate::base::{ResourceType, ResourceWrapper, FloodgateInput, TrafficType};

    fn push_entry(res: &str, ctx: &crate::base::ContextPtr) -> EntryStrongPtr {
        let rw = ResourceWrapper::new(res.into(), ResourceType::Common, TrafficType::Outbound);
        let parent = ctx.read().unwrap().cur_entry().cloned();
        let entry_ctx = EntryContext::new(rw, FloodgateInput::default(), ctx.clone());
        let entry = Arc::new(RwLock::new(FloodgateEntry::new(entry_ctx, None, parent.clone())));
        if let Some(p) = &parent {
            p.write().unwrap().set_child(Arc::downgrade(&entry));
        }
        ctx.write().unwrap().set_cur_entry(Some(entry.clone()));
        EntryStrongPtr::new(entry)
    }

    #[test]
    fn paired_exit() {
        let ctx = enter_context("entry_paired_exit", "");
        let a = push_entry("entry_paired_a", &ctx);
        let b = push_entry("entry_paired_b", &ctx);
        assert!(b.exit().is_ok());
        assert!(a.exit().is_ok());
        assert!(ctx.read().unwrap().cur_entry().is_none());
        exit_context();
    }

    #[test]
    fn out_of_order_exit() {
        let ctx = enter_context("entry_out_of_order", "");
        let a = push_entry("entry_ooo_a", &ctx);
        let b = push_entry("entry_ooo_b", &ctx);
        // exiting the outer entry first unwinds the inner one as well
        assert!(a.exit().is_err());
        assert!(b.is_exited());
        assert!(ctx.read().unwrap().cur_entry().is_none());
        exit_context();
    }

    #[test]
    fn repeated_exit() {
        let ctx = enter_context("entry_repeated_exit", "");
        let a = push_entry("entry_repeated_a", &ctx);
        assert!(a.exit().is_ok());
        assert!(a.exit().is_ok());
        exit_context();
    }
}
