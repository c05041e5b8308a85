use crate::base::FloodgateRule;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Whether the origin list is an allow list or a deny list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Strategy {
    AllowList,
    DenyList,
}

impl Default for Strategy {
    fn default() -> Strategy {
        Strategy::AllowList
    }
}

/// Rule restricts which caller origins may enter a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub id: String,
    pub resource: String,
    pub strategy: Strategy,
    pub origins: Vec<String>,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            strategy: Strategy::default(),
            origins: Vec::new(),
        }
    }
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource.hash(state);
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.strategy == other.strategy
            && self.origins == other.origins
    }
}

impl Eq for Rule {}

impl FloodgateRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.origins.is_empty() {
            return Err(Error::msg("empty origin list"));
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

impl Rule {
    pub fn contains_origin(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }
}
