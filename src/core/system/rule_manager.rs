use super::*;
use crate::base::FloodgateRule;
use crate::logging;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

pub type RuleMap = HashMap<MetricType, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref RULE_MAP: RwLock<RuleMap> = RwLock::new(RuleMap::new());
    static ref CURRENT_RULES: Mutex<Vec<Arc<Rule>>> = Mutex::new(Vec::new());
}

/// `get_rules` returns all the rules in the global rule map.
// This func acquires a read lock on the global `RULE_MAP`,
// please release the lock before calling this func
pub fn get_rules() -> Vec<Arc<Rule>> {
    let rule_map = RULE_MAP.read().unwrap();
    let mut rules: Vec<Arc<Rule>> = Vec::with_capacity(rule_map.len());
    for r in rule_map.values() {
        rules.append(&mut r.clone().into_iter().collect());
    }
    rules
}

/// `load_rules` loads the given system rules, replacing all previous ones.
// This func acquires the lock on the global `CURRENT_RULES`,
// please release the lock before calling this func
pub fn load_rules(rules: Vec<Arc<Rule>>) {
    let mut current_rules = CURRENT_RULES.lock().unwrap();
    if *current_rules == rules {
        logging::info!(
            "[System] Load rules is the same as the current rules, ignoring the load operation."
        );
        return;
    }

    let m = build_rule_map(rules.clone());
    let mut rule_map = RULE_MAP.write().unwrap();
    *rule_map = m;
    logging::info!("[SystemRuleManager] System rules loaded, rules {:?}", rule_map);
    *current_rules = rules;
}

/// `clear_rules` clears all previous rules.
// This func acquires the locks on the global `CURRENT_RULES` and `RULE_MAP`,
// please release the locks before calling this func
pub fn clear_rules() {
    CURRENT_RULES.lock().unwrap().clear();
    RULE_MAP.write().unwrap().clear();
}

fn build_rule_map(rules: Vec<Arc<Rule>>) -> RuleMap {
    let mut m = RuleMap::new();
    for rule in rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[System build_rule_map] Ignoring invalid system rule, rule: {:?}, error: {:?}",
                rule,
                err
            );
            continue;
        }
        let value = m.entry(rule.metric_type).or_default();
        value.insert(rule);
    }
    m
}
