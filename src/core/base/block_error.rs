use super::{BlockType, FloodgateRule};
use crate::utils;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub trait SnapshotTrait: Any + fmt::Debug + utils::AsAny + Send + Sync {}
impl<T: Any + fmt::Debug + utils::AsAny + Send + Sync> SnapshotTrait for T {}
pub type Snapshot = dyn SnapshotTrait;

/// BlockError indicates that the request was blocked by a rule check.
#[derive(Debug, Clone, Default)]
pub struct BlockError {
    block_type: BlockType,
    // block_msg provides additional message for the block error.
    block_msg: String,
    rule: Option<Arc<dyn FloodgateRule>>,
    // snapshot_value represents the triggered "snapshot" value
    snapshot_value: Option<Arc<Snapshot>>,
}

impl PartialEq for BlockError {
    fn eq(&self, other: &BlockError) -> bool {
        self.block_type == other.block_type && self.block_msg == other.block_msg
    }
}

impl BlockError {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            ..Self::default()
        }
    }

    pub fn new_with_msg(block_type: BlockType, block_msg: String) -> Self {
        Self {
            block_type,
            block_msg,
            ..Self::default()
        }
    }

    pub fn new_with_cause(
        block_type: BlockType,
        block_msg: String,
        rule: Arc<dyn FloodgateRule>,
        snapshot_value: Arc<Snapshot>,
    ) -> Self {
        Self {
            block_type,
            block_msg,
            rule: Some(rule),
            snapshot_value: Some(snapshot_value),
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn block_msg(&self) -> String {
        self.block_msg.clone()
    }

    pub fn triggered_rule(&self) -> Option<Arc<dyn FloodgateRule>> {
        self.rule.clone()
    }

    pub fn triggered_value(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_value.clone()
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.block_msg.is_empty() {
            write!(f, "FloodgateBlockError: {}", self.block_type)
        } else {
            write!(
                f,
                "FloodgateBlockError: {}, message: {}",
                self.block_type, self.block_msg
            )
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Default)]
    struct MockRule {}

    impl FloodgateRule for MockRule {
        fn resource_name(&self) -> String {
            "mock resource".into()
        }
    }

    impl fmt::Display for MockRule {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "mock rule")
        }
    }

    #[test]
    fn error_create() {
        let err = BlockError::new(BlockType::Flow);
        assert_eq!(err.block_type(), BlockType::Flow);
        assert_eq!(err.block_msg(), String::default());
        assert!(err.triggered_rule().is_none());
        assert!(err.triggered_value().is_none());

        let err = BlockError::new_with_msg(BlockType::Flow, "mock msg".into());
        assert_eq!(err.block_msg(), String::from("mock msg"));

        let rule: Arc<dyn FloodgateRule> = Arc::new(MockRule::default());
        let snapshot: Arc<Snapshot> = Arc::new(String::from("mock value"));
        let err = BlockError::new_with_cause(
            BlockType::Flow,
            "mock msg".into(),
            Arc::clone(&rule),
            Arc::clone(&snapshot),
        );
        assert!(Arc::ptr_eq(&err.triggered_rule().unwrap(), &rule));
        assert!(Arc::ptr_eq(&err.triggered_value().unwrap(), &snapshot));
    }
}
