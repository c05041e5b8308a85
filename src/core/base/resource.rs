//! Resource/Traffic Wrappers
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// ResourceType represents the classification of resources
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Common,
    Web,
    Rpc,
    ApiGateway,
    Sql,
    Cache,
    Mq,
}

impl Default for ResourceType {
    fn default() -> ResourceType {
        ResourceType::Common
    }
}

impl From<u8> for ResourceType {
    fn from(v: u8) -> ResourceType {
        match v {
            1 => ResourceType::Web,
            2 => ResourceType::Rpc,
            3 => ResourceType::ApiGateway,
            4 => ResourceType::Sql,
            5 => ResourceType::Cache,
            6 => ResourceType::Mq,
            _ => ResourceType::Common,
        }
    }
}

/// TrafficType describes the traffic direction: Inbound or Outbound
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficType {
    Inbound,
    Outbound,
}

impl Default for TrafficType {
    fn default() -> TrafficType {
        TrafficType::Outbound
    }
}

/// ResourceWrapper represents the invocation.
/// Identity is defined by the resource name only; the traffic direction and
/// the classification are descriptive.
#[derive(Debug, Clone, Default)]
pub struct ResourceWrapper {
    name: String,
    classification: ResourceType,
    traffic_type: TrafficType,
}

impl PartialEq for ResourceWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ResourceWrapper {}

impl Hash for ResourceWrapper {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for ResourceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceWrapper{{name={}, trafficType={:?}, classification={:?}}}",
            self.name, self.traffic_type, self.classification
        )
    }
}

impl ResourceWrapper {
    pub fn new(name: String, classification: ResourceType, traffic_type: TrafficType) -> Self {
        Self {
            name,
            classification,
            traffic_type,
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn classification(&self) -> &ResourceType {
        &self.classification
    }

    pub fn traffic_type(&self) -> &TrafficType {
        &self.traffic_type
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(t: &T) -> u64 {
        let mut h = DefaultHasher::new();
        t.hash(&mut h);
        h.finish()
    }

    #[test]
    fn identity_by_name_only() {
        let a = ResourceWrapper::new("abc".into(), ResourceType::Web, TrafficType::Inbound);
        let b = ResourceWrapper::new("abc".into(), ResourceType::Rpc, TrafficType::Outbound);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        let c = ResourceWrapper::new("abd".into(), ResourceType::Web, TrafficType::Inbound);
        assert_ne!(a, c);
    }
}
