//! Context
//!
use super::{EntryInnerPtr, ResourceWrapper, TokenResult};
use crate::core::stat::{DefaultNode, StatisticNode};
use crate::utils::time::curr_time_millis;
use crate::Error;
use std::sync::{Arc, RwLock};

pub type ContextPtr = Arc<RwLock<Context>>;

/// A named call-tree root identifying the logical entry point of the
/// current task. Multiple tasks entering the same context name share the
/// same entrance node. The context also carries the stack of in-flight
/// entries of the task: `cur_entry` is the innermost one, its `parent`
/// links lead back to the outermost.
pub struct Context {
    name: String,
    origin: String,
    /// `None` marks the sentinel "null context" handed out when the
    /// configured context cap is exceeded; every check passes through it.
    entrance: Option<Arc<DefaultNode>>,
    cur_entry: Option<EntryInnerPtr>,
}

impl Context {
    pub fn new(name: String, origin: String, entrance: Arc<DefaultNode>) -> Self {
        Context {
            name,
            origin,
            entrance: Some(entrance),
            cur_entry: None,
        }
    }

    pub fn new_null() -> Self {
        Context {
            name: String::new(),
            origin: String::new(),
            entrance: None,
            cur_entry: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.entrance.is_none()
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn origin(&self) -> &String {
        &self.origin
    }

    pub fn entrance_node(&self) -> Option<Arc<DefaultNode>> {
        self.entrance.clone()
    }

    pub fn cur_entry(&self) -> Option<&EntryInnerPtr> {
        self.cur_entry.as_ref()
    }

    pub fn set_cur_entry(&mut self, entry: Option<EntryInnerPtr>) {
        self.cur_entry = entry;
    }
}

pub type ParamKey = String;
pub type ParamsList = Vec<ParamKey>;

/// Input of the policy algorithms
#[derive(Debug)]
pub struct FloodgateInput {
    batch_count: u32,
    prioritized: bool,
    args: Option<ParamsList>,
}

impl Default for FloodgateInput {
    fn default() -> Self {
        FloodgateInput {
            batch_count: 1,
            prioritized: false,
            args: None,
        }
    }
}

impl FloodgateInput {
    pub fn new(batch_count: u32, prioritized: bool) -> Self {
        FloodgateInput {
            batch_count,
            prioritized,
            ..Default::default()
        }
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn prioritized(&self) -> bool {
        self.prioritized
    }

    pub fn set_args(&mut self, args: ParamsList) {
        self.args = Some(args);
    }

    pub fn args(&self) -> Option<&ParamsList> {
        self.args.as_ref()
    }
}

/// The per-entry state threaded through the slot chain.
pub struct EntryContext {
    /// the named call context this entry runs under
    call_ctx: ContextPtr,
    resource: ResourceWrapper,
    input: FloodgateInput,
    /// the tree node of the enclosing entry (or the entrance node), used by
    /// the node selector to link the call tree
    parent_node: Option<Arc<DefaultNode>>,
    /// per-(context, resource) statistics, installed by the node selector
    cur_node: Option<Arc<DefaultNode>>,
    /// per-origin statistics under the resource's cluster node
    origin_node: Option<Arc<StatisticNode>>,
    /// used to calculate RT
    start_time: u64,
    round_trip: u64,
    /// the result of the rule-check slots
    rule_check_result: TokenResult,
    err: Option<Error>,
}

impl EntryContext {
    pub fn new(resource: ResourceWrapper, input: FloodgateInput, call_ctx: ContextPtr) -> Self {
        EntryContext {
            call_ctx,
            resource,
            input,
            parent_node: None,
            cur_node: None,
            origin_node: None,
            start_time: curr_time_millis(),
            round_trip: 0,
            rule_check_result: TokenResult::default(),
            err: None,
        }
    }

    pub fn call_ctx(&self) -> &ContextPtr {
        &self.call_ctx
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn input(&self) -> &FloodgateInput {
        &self.input
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn set_round_trip(&mut self, round_trip: u64) {
        self.round_trip = round_trip;
    }

    pub fn round_trip(&self) -> u64 {
        self.round_trip
    }

    pub fn set_parent_node(&mut self, node: Option<Arc<DefaultNode>>) {
        self.parent_node = node;
    }

    pub fn parent_node(&self) -> Option<Arc<DefaultNode>> {
        self.parent_node.clone()
    }

    pub fn set_cur_node(&mut self, node: Arc<DefaultNode>) {
        self.cur_node = Some(node);
    }

    pub fn cur_node(&self) -> Option<Arc<DefaultNode>> {
        self.cur_node.clone()
    }

    pub fn set_origin_node(&mut self, node: Arc<StatisticNode>) {
        self.origin_node = Some(node);
    }

    pub fn origin_node(&self) -> Option<Arc<StatisticNode>> {
        self.origin_node.clone()
    }

    pub fn set_result(&mut self, result: TokenResult) {
        self.rule_check_result = result;
    }

    pub fn reset_result_to_pass(&mut self) {
        self.rule_check_result.reset_to_pass();
    }

    pub fn result(&self) -> &TokenResult {
        &self.rule_check_result
    }

    pub fn is_blocked(&self) -> bool {
        self.rule_check_result.is_blocked()
    }

    pub fn set_err(&mut self, err: Error) {
        self.err = Some(err);
    }

    pub fn get_err(&self) -> &Option<Error> {
        &self.err
    }
}
