use super::*;
use crate::base::FloodgateRule;
use crate::{logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// ControllerGenFn represents the traffic controller generator function of
/// a specific (calculate, control) strategy pair.
pub type ControllerGenFn = dyn Send + Sync + Fn(Arc<Rule>) -> Arc<Controller>;

#[derive(Hash, PartialEq, Eq)]
pub struct ControllerGenKey {
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
}

impl ControllerGenKey {
    pub fn new(calculate_strategy: CalculateStrategy, control_strategy: ControlStrategy) -> Self {
        ControllerGenKey {
            calculate_strategy,
            control_strategy,
        }
    }
}

/// ControllerMap represents the map storage for Controller.
pub type ControllerMap = HashMap<String, Vec<Arc<Controller>>>;
pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

lazy_static! {
    static ref GEN_FUN_MAP: HashMap<ControllerGenKey, Box<ControllerGenFn>> = {
        // the closed set of control behaviors:
        // (Direct, Reject)       -> fixed-threshold reject
        // (WarmUp, Reject)       -> token-bucket warm-up
        // (Direct, Throttling)   -> leaky-bucket pacing
        // (WarmUp, Throttling)   -> warm-up with pacing
        let mut gen_fun_map: HashMap<ControllerGenKey, Box<ControllerGenFn>> = HashMap::new();

        gen_fun_map.insert(
            ControllerGenKey::new(CalculateStrategy::Direct, ControlStrategy::Reject),
            Box::new(gen_direct_reject),
        );

        gen_fun_map.insert(
            ControllerGenKey::new(CalculateStrategy::Direct, ControlStrategy::Throttling),
            Box::new(gen_direct_throttling),
        );

        gen_fun_map.insert(
            ControllerGenKey::new(CalculateStrategy::WarmUp, ControlStrategy::Reject),
            Box::new(gen_warmup_reject),
        );

        gen_fun_map.insert(
            ControllerGenKey::new(CalculateStrategy::WarmUp, ControlStrategy::Throttling),
            Box::new(gen_warmup_throttling),
        );
        gen_fun_map
    };
    static ref CONTROLLER_MAP: Mutex<ControllerMap> = Mutex::new(HashMap::new());
    static ref RULE_MAP: Mutex<RuleMap> = Mutex::new(HashMap::new());
}

use gen_fns::*;
mod gen_fns {
    use super::*;

    fn assemble(
        rule: Arc<Rule>,
        calculator: Arc<Mutex<dyn Calculator>>,
        checker: Arc<Mutex<dyn Checker>>,
    ) -> Arc<Controller> {
        let mut tsc = Controller::new(Arc::clone(&rule));
        tsc.set_calculator(Arc::clone(&calculator));
        tsc.set_checker(Arc::clone(&checker));
        let tsc = Arc::new(tsc);
        let mut calculator = calculator.lock().unwrap();
        let mut checker = checker.lock().unwrap();
        calculator.set_owner(Arc::downgrade(&tsc));
        checker.set_owner(Arc::downgrade(&tsc));
        drop(calculator);
        drop(checker);
        tsc
    }

    pub(super) fn gen_direct_reject(rule: Arc<Rule>) -> Arc<Controller> {
        let calculator: Arc<Mutex<dyn Calculator>> = Arc::new(Mutex::new(DirectCalculator::new(
            Weak::new(),
            rule.threshold,
        )));
        let checker: Arc<Mutex<dyn Checker>> = Arc::new(Mutex::new(RejectChecker::new(
            Weak::new(),
            Arc::clone(&rule),
        )));
        assemble(rule, calculator, checker)
    }

    pub(super) fn gen_direct_throttling(rule: Arc<Rule>) -> Arc<Controller> {
        let calculator: Arc<Mutex<dyn Calculator>> = Arc::new(Mutex::new(DirectCalculator::new(
            Weak::new(),
            rule.threshold,
        )));
        let checker: Arc<Mutex<dyn Checker>> = Arc::new(Mutex::new(ThrottlingChecker::new(
            Weak::new(),
            rule.max_queueing_time_ms,
        )));
        assemble(rule, calculator, checker)
    }

    pub(super) fn gen_warmup_reject(rule: Arc<Rule>) -> Arc<Controller> {
        let calculator: Arc<Mutex<dyn Calculator>> = Arc::new(Mutex::new(WarmUpCalculator::new(
            Weak::new(),
            Arc::clone(&rule),
        )));
        let checker: Arc<Mutex<dyn Checker>> = Arc::new(Mutex::new(RejectChecker::new(
            Weak::new(),
            Arc::clone(&rule),
        )));
        assemble(rule, calculator, checker)
    }

    pub(super) fn gen_warmup_throttling(rule: Arc<Rule>) -> Arc<Controller> {
        let calculator: Arc<Mutex<dyn Calculator>> = Arc::new(Mutex::new(WarmUpCalculator::new(
            Weak::new(),
            Arc::clone(&rule),
        )));
        let checker: Arc<Mutex<dyn Checker>> = Arc::new(Mutex::new(ThrottlingChecker::new(
            Weak::new(),
            rule.max_queueing_time_ms,
        )));
        assemble(rule, calculator, checker)
    }
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[FlowRuleManager] Flow rules were cleared")
    } else {
        logging::info!(
            "[FlowRuleManager] Flow rules were loaded: {:?}",
            map.values()
        )
    }
}

/// `load_rules` loads the given flow rules to the rule manager, while all
/// previous rules will be replaced.
// This func acquires locks on the global `RULE_MAP` and `CONTROLLER_MAP`,
// please release your locks on them before calling this func
pub fn load_rules(rules: Vec<Arc<Rule>>) {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        let entry = rule_map.entry(rule.resource.clone()).or_insert_with(Vec::new);
        entry.push(rule);
    }

    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[Flow] Load rules is the same as the current rules, ignoring the load operation."
        );
        return;
    }
    // ignore invalid rules
    let mut valid_rules_map = HashMap::with_capacity(rule_map.len());
    for (res, rules) in &rule_map {
        let mut valid_rules = Vec::new();
        for rule in rules {
            match rule.is_valid() {
                Ok(_) => valid_rules.push(Arc::clone(rule)),
                Err(err) => logging::warn!(
                    "[Flow load_rules] Ignoring invalid flow rule {:?}, reason: {:?}",
                    rule,
                    err
                ),
            }
        }
        if !valid_rules.is_empty() {
            valid_rules_map.insert(res.clone(), valid_rules);
        }
    }

    let start = utils::curr_time_nanos();
    let mut controller_map = CONTROLLER_MAP.lock().unwrap();
    let mut valid_controller_map = HashMap::with_capacity(valid_rules_map.len());

    // build the controller map according to the valid rules
    for (res, rules) in valid_rules_map.iter() {
        let new_tcs_of_res = build_resource_traffic_shaping_controller(
            res,
            rules.clone(),
            controller_map.get_mut(res).unwrap_or(&mut Vec::new()),
        );
        if !new_tcs_of_res.is_empty() {
            valid_controller_map.insert(res.clone(), new_tcs_of_res);
        }
    }
    *controller_map = valid_controller_map;
    *global_rule_map = rule_map;
    drop(controller_map);
    logging::debug!(
        "[Flow load_rules] Time statistics (ns) for updating flow rules, time cost: {}",
        utils::curr_time_nanos() - start
    );
    log_rule_update(&valid_rules_map);
}

/// `load_rules_of_resource` loads the given resource's flow rules, while
/// all of the resource's previous rules will be replaced. The returned
/// value indicates whether a real load operation happened.
// This func acquires locks on the global `RULE_MAP` and `CONTROLLER_MAP`,
// please release your locks on them before calling this func
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let mut global_rule_map = RULE_MAP.lock().unwrap();
    let mut global_controller_map = CONTROLLER_MAP.lock().unwrap();
    // clear the resource's rules
    if rules.is_empty() {
        global_rule_map.remove(res);
        global_controller_map.remove(res);
        logging::info!("[Flow] Cleared resource level rules, resource {}", res);
        return Ok(true);
    }
    // load resource level rules
    if global_rule_map.get(res).map(Vec::as_slice) == Some(rules.as_slice()) {
        logging::info!(
            "[Flow] Load resource level rules is the same as the current rules, ignoring."
        );
        return Ok(false);
    }

    let mut valid_res_rules = Vec::with_capacity(rules.len());
    for rule in &rules {
        match rule.is_valid() {
            Ok(_) => valid_res_rules.push(Arc::clone(rule)),
            Err(err) => logging::warn!(
                "[Flow load_rules_of_resource] Ignoring invalid flow rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }

    let mut placeholder = Vec::new();
    let old_res_tcs = global_controller_map
        .get_mut(res)
        .unwrap_or(&mut placeholder);
    let new_res_tcs = build_resource_traffic_shaping_controller(res, valid_res_rules, old_res_tcs);

    if new_res_tcs.is_empty() {
        global_controller_map.remove(res);
    } else {
        global_controller_map.insert(res.into(), new_res_tcs);
    }
    global_rule_map.insert(res.into(), rules);
    Ok(true)
}

/// `get_rules` returns all the rules based on a copy.
// This func acquires the lock on the global `CONTROLLER_MAP`,
// please release your lock on it before calling this func
pub fn get_rules() -> Vec<Arc<Rule>> {
    let mut rules = Vec::new();
    let controller_map = CONTROLLER_MAP.lock().unwrap();
    for controllers in controller_map.values() {
        for c in controllers {
            rules.push(Arc::clone(c.rule()));
        }
    }
    rules
}

/// `get_rules_of_resource` returns the specific resource's rules.
// This func acquires the lock on the global `CONTROLLER_MAP`,
// please release your lock on it before calling this func
pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    let controller_map = CONTROLLER_MAP.lock().unwrap();
    controller_map
        .get(res)
        .map(|controllers| controllers.iter().map(|c| Arc::clone(c.rule())).collect())
        .unwrap_or_default()
}

/// clear_rules clears all the rules in the flow module.
// This func acquires locks on the global `RULE_MAP` and `CONTROLLER_MAP`,
// please release your locks on them before calling this func
pub fn clear_rules() {
    RULE_MAP.lock().unwrap().clear();
    CONTROLLER_MAP.lock().unwrap().clear();
}

/// `clear_rules_of_resource` clears the resource level rules.
// This func acquires locks on the global `RULE_MAP` and `CONTROLLER_MAP`,
// please release your locks on them before calling this func
pub fn clear_rules_of_resource(res: &str) {
    RULE_MAP.lock().unwrap().remove(res);
    CONTROLLER_MAP.lock().unwrap().remove(res);
}

// This func acquires the lock on the global `CONTROLLER_MAP`,
// please release your lock on it before calling this func
pub fn get_traffic_controller_list_for(name: &str) -> Vec<Arc<Controller>> {
    let controller_map = CONTROLLER_MAP.lock().unwrap();
    controller_map.get(name).cloned().unwrap_or_default()
}

/// Whether any rule of the resource targets the given origin explicitly.
/// Rules with `limit_origin == "other"` only apply to origins for which
/// this returns false.
pub fn is_origin_targeted(origin: &str, res: &str) -> bool {
    RULE_MAP
        .lock()
        .unwrap()
        .get(res)
        .map(|rules| rules.iter().any(|r| r.limit_origin == origin))
        .unwrap_or(false)
}

fn calculate_eq_index_for(r: &Arc<Rule>, old_res_tcs: &[Arc<Controller>]) -> Option<usize> {
    old_res_tcs
        .iter()
        .position(|old_tc| old_tc.rule().as_ref() == r.as_ref())
}

/// build_resource_traffic_shaping_controller builds a Controller slice from
/// the rules. The resource of the rules must equal `res`. A controller
/// whose rule is unchanged is reused as-is, keeping its warm-up and pacing
/// state across reloads.
pub fn build_resource_traffic_shaping_controller(
    res: &str,
    rules_of_res: Vec<Arc<Rule>>,
    old_res_tcs: &mut Vec<Arc<Controller>>,
) -> Vec<Arc<Controller>> {
    let mut new_res_tcs = Vec::with_capacity(rules_of_res.len());
    for rule in rules_of_res {
        if res != rule.resource {
            logging::error!("unmatched resource name, expect: {}, actual: {}. Unmatched resource name in flow::build_resource_traffic_shaping_controller(), rule: {:?}", res, rule.resource, rule);
            continue;
        }
        if let Some(eq_idx) = calculate_eq_index_for(&rule, old_res_tcs) {
            // reuse the old tc and remove it from the old list
            let eq_old_tc = Arc::clone(&old_res_tcs[eq_idx]);
            new_res_tcs.push(eq_old_tc);
            old_res_tcs.remove(eq_idx);
            continue;
        }

        let key = ControllerGenKey::new(rule.calculate_strategy, rule.control_strategy);
        let generator = GEN_FUN_MAP.get(&key);
        match generator {
            Some(generator) => new_res_tcs.push(generator(rule)),
            None => {
                logging::error!("Unsupported flow control strategy. Ignoring the rule due to an unsupported control behavior in flow::build_resource_traffic_shaping_controller(), rule: {}", rule);
                continue;
            }
        }
    }
    new_res_tcs
}
