//! Ordered execution of inline rules.
//!
//! Groups run in lexicographic order of `group_name`; inside a group rules run
//! by `sort_order`, then `id`. Each rule works on a clone of the current
//! transaction, and only a successful, modifying run replaces it. A modifying
//! final rule ends its group. Any script error aborts the whole execution and
//! the caller's transaction is left as it was.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{EngineError, ResultEngine, Rule, ScriptRunner, Transaction};

#[derive(Clone, Debug, Default)]
pub struct RuleExecutor {
    groups: Vec<(String, Vec<Rule>)>,
}

/// Result of a rule pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Execution {
    pub transaction: Transaction,
    pub modified: bool,
}

impl RuleExecutor {
    /// Keep enabled, non-deleted rules and order them for execution.
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut grouped: BTreeMap<String, Vec<Rule>> = BTreeMap::new();
        for rule in rules
            .into_iter()
            .filter(|r| r.enabled && r.deleted_at.is_none())
        {
            grouped.entry(rule.group_name.clone()).or_default().push(rule);
        }
        let groups = grouped
            .into_iter()
            .map(|(name, mut rules)| {
                rules.sort_by_key(|r| (r.sort_order, r.id));
                (name, rules)
            })
            .collect();
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rule ids in execution order.
    pub fn order(&self) -> Vec<i32> {
        self.groups
            .iter()
            .flat_map(|(_, rules)| rules.iter().map(|r| r.id))
            .collect()
    }

    pub fn execute(
        &self,
        input: &Transaction,
        runner: &dyn ScriptRunner,
        cancelled: &AtomicBool,
    ) -> ResultEngine<Execution> {
        let mut tx = input.clone();
        let mut modified = false;

        for (_, rules) in &self.groups {
            for rule in rules {
                if cancelled.load(Ordering::Relaxed) {
                    return Err(EngineError::Cancelled);
                }
                let mut candidate = tx.clone();
                let changed = runner.run(&rule.script, &mut candidate).map_err(|err| {
                    let message = match err {
                        EngineError::Script(message) => message,
                        other => other.to_string(),
                    };
                    EngineError::Script(format!("rule {} ({}): {message}", rule.id, rule.title))
                })?;
                if changed {
                    tx = candidate;
                    modified = true;
                    if rule.is_final_rule {
                        break;
                    }
                }
            }
        }

        Ok(Execution {
            transaction: tx,
            modified,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::Utc;

    use super::*;

    /// Appends the script text to the title; `fail` raises, `noop` changes nothing.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl ScriptRunner for Recorder {
        fn run(&self, script: &str, tx: &mut Transaction) -> ResultEngine<bool> {
            self.calls.borrow_mut().push(script.to_string());
            match script {
                "fail" => Err(EngineError::Script("boom".to_string())),
                "noop" => Ok(false),
                other => {
                    tx.title.push_str(other);
                    Ok(true)
                }
            }
        }
    }

    fn rule(id: i32, group: &str, sort_order: i32, script: &str) -> Rule {
        let mut rule = Rule::new(&format!("rule {id}"), script).group(group, sort_order);
        rule.id = id;
        rule
    }

    fn run(rules: Vec<Rule>) -> (ResultEngine<Execution>, Vec<String>) {
        let recorder = Recorder::default();
        let result = RuleExecutor::new(rules).execute(
            &Transaction::empty(Utc::now()),
            &recorder,
            &AtomicBool::new(false),
        );
        (result, recorder.calls.into_inner())
    }

    #[test]
    fn groups_sort_lexicographically_and_rules_by_sort_order_then_id() {
        let executor = RuleExecutor::new(vec![
            rule(4, "b", 1, "x"),
            rule(3, "a", 2, "x"),
            rule(2, "a", 1, "x"),
            rule(1, "a", 2, "x"),
            rule(5, "", 9, "x"),
        ]);
        assert_eq!(executor.order(), vec![5, 2, 1, 3, 4]);
    }

    #[test]
    fn modifications_chain_in_order() {
        let (result, _) = run(vec![rule(2, "g", 2, "B"), rule(1, "g", 1, "A")]);
        let execution = result.unwrap();
        assert!(execution.modified);
        assert_eq!(execution.transaction.title, "AB");
    }

    #[test]
    fn final_rule_stops_only_its_group() {
        let mut stop = rule(1, "a", 1, "A");
        stop.is_final_rule = true;
        let (result, calls) = run(vec![stop, rule(2, "a", 2, "B"), rule(3, "b", 1, "C")]);
        assert_eq!(result.unwrap().transaction.title, "AC");
        assert_eq!(calls, vec!["A", "C"]);
    }

    #[test]
    fn unmodified_final_rule_does_not_stop_group() {
        let mut stop = rule(1, "a", 1, "noop");
        stop.is_final_rule = true;
        let (result, _) = run(vec![stop, rule(2, "a", 2, "B")]);
        assert_eq!(result.unwrap().transaction.title, "B");
    }

    #[test]
    fn error_aborts_everything() {
        let (result, calls) = run(vec![
            rule(1, "a", 1, "A"),
            rule(2, "a", 2, "fail"),
            rule(3, "b", 1, "C"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            EngineError::Script("rule 2 (rule 2): boom".to_string())
        );
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn disabled_and_deleted_rules_are_skipped() {
        let mut disabled = rule(1, "a", 1, "A");
        disabled.enabled = false;
        let mut deleted = rule(2, "a", 2, "B");
        deleted.deleted_at = Some(Utc::now());
        let executor = RuleExecutor::new(vec![disabled, deleted]);
        assert!(executor.is_empty());
    }

    #[test]
    fn execution_is_deterministic() {
        let rules = vec![rule(2, "b", 1, "Y"), rule(1, "a", 1, "X")];
        let (first, _) = run(rules.clone());
        let (second, _) = run(rules);
        assert_eq!(
            first.unwrap().transaction.title,
            second.unwrap().transaction.title
        );
    }

    #[test]
    fn cancellation_stops_before_next_rule() {
        let recorder = Recorder::default();
        let result = RuleExecutor::new(vec![rule(1, "a", 1, "A")]).execute(
            &Transaction::empty(Utc::now()),
            &recorder,
            &AtomicBool::new(true),
        );
        assert_eq!(result.unwrap_err(), EngineError::Cancelled);
        assert!(recorder.calls.borrow().is_empty());
    }
}
