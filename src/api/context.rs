//! The task-local call context. Each worker task owns at most one current
//! context; entries built on the task stack up under it.

use crate::base::{Context, ContextPtr, DEFAULT_CONTEXT_NAME};
use crate::core::stat;
use crate::{config, logging};
use std::cell::RefCell;
use std::sync::{Arc, RwLock};

thread_local! {
    static LOCAL_CONTEXT: RefCell<Option<ContextPtr>> = RefCell::new(None);
}

/// Enters (or returns) the current task's call context. The call is
/// idempotent per task: entering while a context is active returns the
/// active one, whatever name was asked for. An over-long name or an
/// exhausted context cap yields the null context, under which every check
/// passes.
pub fn enter_context(name: &str, origin: &str) -> ContextPtr {
    if let Some(existing) = current_context() {
        return existing;
    }
    let ctx = if name.is_empty() || name.len() > config::max_context_name_len() {
        logging::warn!(
            "[enter_context] Invalid context name (empty or longer than {}), using the null context",
            config::max_context_name_len()
        );
        Context::new_null()
    } else {
        match stat::get_or_create_entrance_node(name) {
            Some(entrance) => Context::new(name.into(), origin.into(), entrance),
            None => Context::new_null(),
        }
    };
    let ptr = Arc::new(RwLock::new(ctx));
    LOCAL_CONTEXT.with(|c| *c.borrow_mut() = Some(ptr.clone()));
    ptr
}

/// Leaves the current task's context. The context stays active while it
/// still carries in-flight entries.
pub fn exit_context() {
    LOCAL_CONTEXT.with(|c| {
        let mut slot = c.borrow_mut();
        let clear = match &*slot {
            Some(ctx) => ctx.read().unwrap().cur_entry().is_none(),
            None => false,
        };
        if clear {
            *slot = None;
        }
    });
}

pub fn current_context() -> Option<ContextPtr> {
    LOCAL_CONTEXT.with(|c| c.borrow().clone())
}

pub(crate) fn enter_default_context() -> ContextPtr {
    enter_context(DEFAULT_CONTEXT_NAME, "")
}

/// When the last entry of the implicitly entered default context exits,
/// the context is released with it.
pub(crate) fn exit_default_context(ctx: &ContextPtr) {
    if ctx.read().unwrap().name() != DEFAULT_CONTEXT_NAME {
        return;
    }
    LOCAL_CONTEXT.with(|c| {
        let mut slot = c.borrow_mut();
        let clear = match &*slot {
            Some(cur) => Arc::ptr_eq(cur, ctx),
            None => false,
        };
        if clear {
            *slot = None;
        }
    });
}
