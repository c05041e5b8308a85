use super::{Breaker, Rule};
use crate::base::FloodgateRule;
use crate::{logging, Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type BreakerMap = HashMap<String, Vec<Arc<Breaker>>>;
pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

lazy_static! {
    static ref BREAKER_MAP: RwLock<BreakerMap> = RwLock::new(BreakerMap::new());
    static ref RULE_MAP: RwLock<RuleMap> = RwLock::new(RuleMap::new());
}

/// `load_rules` replaces all previous degrade rules with the given ones.
/// A rule equal to a currently installed one keeps its breaker (and
/// therefore its open/closed state); new rules start closed.
pub fn load_rules(rules: Vec<Arc<Rule>>) {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        let entry = rule_map.entry(rule.resource.clone()).or_insert_with(Vec::new);
        entry.push(rule);
    }

    let mut global_rule_map = RULE_MAP.write().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[Degrade] Load rules is the same as the current rules, ignoring the load operation."
        );
        return;
    }

    let mut breaker_map = BREAKER_MAP.write().unwrap();
    let mut new_breaker_map = BreakerMap::with_capacity(rule_map.len());
    for (res, rules) in &rule_map {
        let mut breakers = Vec::with_capacity(rules.len());
        for rule in rules {
            if let Err(err) = rule.is_valid() {
                logging::warn!(
                    "[Degrade load_rules] Ignoring invalid degrade rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                continue;
            }
            let reused = breaker_map
                .get(res)
                .and_then(|olds| olds.iter().find(|b| b.rule().as_ref() == rule.as_ref()))
                .cloned();
            breakers.push(reused.unwrap_or_else(|| Arc::new(Breaker::new(Arc::clone(rule)))));
        }
        if !breakers.is_empty() {
            new_breaker_map.insert(res.clone(), breakers);
        }
    }
    *breaker_map = new_breaker_map;
    *global_rule_map = rule_map;
    logging::info!(
        "[DegradeRuleManager] Degrade rules were loaded, resources: {:?}",
        global_rule_map.keys()
    );
}

/// `load_rules_of_resource` replaces the given resource's degrade rules.
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let mut global_rule_map = RULE_MAP.write().unwrap();
    let mut breaker_map = BREAKER_MAP.write().unwrap();
    if rules.is_empty() {
        global_rule_map.remove(res);
        breaker_map.remove(res);
        logging::info!("[Degrade] Cleared resource level rules, resource {}", res);
        return Ok(true);
    }
    if global_rule_map.get(res).map(Vec::as_slice) == Some(rules.as_slice()) {
        return Ok(false);
    }
    let mut breakers = Vec::with_capacity(rules.len());
    let mut valid_rules = Vec::with_capacity(rules.len());
    for rule in rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[Degrade load_rules_of_resource] Ignoring invalid degrade rule {:?}, reason: {:?}",
                rule,
                err
            );
            continue;
        }
        let reused = breaker_map
            .get(res)
            .and_then(|olds| olds.iter().find(|b| b.rule().as_ref() == rule.as_ref()))
            .cloned();
        breakers.push(reused.unwrap_or_else(|| Arc::new(Breaker::new(Arc::clone(&rule)))));
        valid_rules.push(rule);
    }
    if breakers.is_empty() {
        breaker_map.remove(res);
        global_rule_map.remove(res);
    } else {
        breaker_map.insert(res.into(), breakers);
        global_rule_map.insert(res.into(), valid_rules);
    }
    Ok(true)
}

pub fn get_rules() -> Vec<Arc<Rule>> {
    let rule_map = RULE_MAP.read().unwrap();
    rule_map.values().flatten().cloned().collect()
}

pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    RULE_MAP.read().unwrap().get(res).cloned().unwrap_or_default()
}

pub fn clear_rules() {
    RULE_MAP.write().unwrap().clear();
    BREAKER_MAP.write().unwrap().clear();
}

pub fn get_breakers_of_resource(res: &str) -> Vec<Arc<Breaker>> {
    BREAKER_MAP.read().unwrap().get(res).cloned().unwrap_or_default()
}
