//! Validation rules: the Verifying phase's ordered checks.
//!
//! Rules are evaluated in order for a task type; the first unsatisfied rule
//! ends verification for that iteration and its message becomes the feedback
//! carried into the next one.

use std::collections::HashMap;
use std::sync::Arc;

use taskloop_core::task::{Task, WorkerResult};

/// Everything a rule may look at after the Acting phase.
pub struct ValidationInput<'a> {
    pub task: &'a Task,
    pub iteration: u32,
    /// Worker names the task type required this iteration.
    pub required: &'a [String],
    /// Results of workers that returned (errored workers are absent).
    pub results: &'a [WorkerResult],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Satisfied,
    /// Human-readable feedback for the next iteration.
    Unsatisfied(String),
}

impl RuleOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, RuleOutcome::Satisfied)
    }
}

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, input: &ValidationInput<'_>) -> RuleOutcome;
}

/// Every required worker returned a result.
pub struct RequiredWorkersReported;

impl ValidationRule for RequiredWorkersReported {
    fn name(&self) -> &str {
        "required_workers_reported"
    }

    fn check(&self, input: &ValidationInput<'_>) -> RuleOutcome {
        let missing: Vec<&str> = input
            .required
            .iter()
            .filter(|w| !input.results.iter().any(|r| &r.worker == *w))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            RuleOutcome::Satisfied
        } else {
            RuleOutcome::Unsatisfied(format!(
                "No result from required worker(s): {}",
                missing.join(", ")
            ))
        }
    }
}

/// Any result that reports `data.coverage` must meet the threshold.
pub struct CoverageAtLeast {
    pub threshold: f64,
}

impl ValidationRule for CoverageAtLeast {
    fn name(&self) -> &str {
        "coverage_at_least"
    }

    fn check(&self, input: &ValidationInput<'_>) -> RuleOutcome {
        for result in input.results {
            if let Some(coverage) = result.data.get("coverage").and_then(|c| c.as_f64())
                && coverage < self.threshold
            {
                return RuleOutcome::Unsatisfied(format!(
                    "Coverage {coverage:.1}% reported by {} is below {:.1}%",
                    result.worker, self.threshold
                ));
            }
        }
        RuleOutcome::Satisfied
    }
}

/// Rule backed by a closure.
pub struct FnRule<F> {
    name: String,
    check: F,
}

impl<F> ValidationRule for FnRule<F>
where
    F: Fn(&ValidationInput<'_>) -> RuleOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, input: &ValidationInput<'_>) -> RuleOutcome {
        (self.check)(input)
    }
}

pub fn rule_fn<F>(name: impl Into<String>, check: F) -> Arc<dyn ValidationRule>
where
    F: Fn(&ValidationInput<'_>) -> RuleOutcome + Send + Sync + 'static,
{
    Arc::new(FnRule {
        name: name.into(),
        check,
    })
}

/// Ordered rule lists keyed by task type, with a fallback list for types
/// that have none of their own.
#[derive(Clone, Default)]
pub struct RuleSet {
    by_kind: HashMap<String, Vec<Arc<dyn ValidationRule>>>,
    fallback: Vec<Arc<dyn ValidationRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules applied when no worker-produced data needs special checks:
    /// every type requires its workers to report, and test-producing types
    /// additionally enforce the coverage threshold.
    pub fn defaults(coverage_threshold: f64) -> Self {
        let reported: Arc<dyn ValidationRule> = Arc::new(RequiredWorkersReported);
        let coverage: Arc<dyn ValidationRule> = Arc::new(CoverageAtLeast {
            threshold: coverage_threshold,
        });

        let mut set = Self::new().with_fallback(vec![reported.clone()]);
        for kind in ["test", "bugfix", "refactor"] {
            set.set(kind, vec![reported.clone(), coverage.clone()]);
        }
        set
    }

    pub fn with_fallback(mut self, rules: Vec<Arc<dyn ValidationRule>>) -> Self {
        self.fallback = rules;
        self
    }

    /// Replace the rule list for `kind`.
    pub fn set(&mut self, kind: impl Into<String>, rules: Vec<Arc<dyn ValidationRule>>) {
        self.by_kind.insert(kind.into(), rules);
    }

    pub fn rules_for(&self, kind: &str) -> &[Arc<dyn ValidationRule>] {
        self.by_kind
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or(&self.fallback)
    }

    /// Run the rules for the input's task type in order, stopping at the
    /// first unsatisfied one. Returns the failing rule's name with its outcome.
    pub fn evaluate(&self, input: &ValidationInput<'_>) -> Option<(String, String)> {
        self.rules_for(&input.task.kind).iter().find_map(|rule| {
            match rule.check(input) {
                RuleOutcome::Satisfied => None,
                RuleOutcome::Unsatisfied(feedback) => Some((rule.name().to_string(), feedback)),
            }
        })
    }
}
