use super::Rule;
use crate::base::FloodgateRule;
use crate::{logging, Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

lazy_static! {
    static ref RULE_MAP: RwLock<RuleMap> = RwLock::new(RuleMap::new());
}

/// `load_rules` replaces all previous authority rules with the given ones.
pub fn load_rules(rules: Vec<Arc<Rule>>) {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[Authority load_rules] Ignoring invalid authority rule {:?}, reason: {:?}",
                rule,
                err
            );
            continue;
        }
        rule_map
            .entry(rule.resource.clone())
            .or_insert_with(Vec::new)
            .push(rule);
    }
    let mut global = RULE_MAP.write().unwrap();
    *global = rule_map;
    logging::info!(
        "[AuthorityRuleManager] Authority rules were loaded, resources: {:?}",
        global.keys()
    );
}

/// `load_rules_of_resource` replaces the given resource's authority rules.
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let mut global = RULE_MAP.write().unwrap();
    if rules.is_empty() {
        global.remove(res);
        return Ok(true);
    }
    let mut valid = Vec::with_capacity(rules.len());
    for rule in rules {
        if rule.is_valid().is_ok() {
            valid.push(rule);
        }
    }
    global.insert(res.into(), valid);
    Ok(true)
}

pub fn get_rules() -> Vec<Arc<Rule>> {
    RULE_MAP.read().unwrap().values().flatten().cloned().collect()
}

pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    RULE_MAP.read().unwrap().get(res).cloned().unwrap_or_default()
}

pub fn clear_rules() {
    RULE_MAP.write().unwrap().clear();
}
