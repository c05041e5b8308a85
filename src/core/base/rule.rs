//! Rule
//!
use crate::Result;
use std::fmt;

/// The base trait of all rule entities managed by the rule managers.
pub trait FloodgateRule: fmt::Debug + fmt::Display + Send + Sync {
    fn resource_name(&self) -> String;

    fn is_valid(&self) -> Result<()> {
        Ok(())
    }
}
