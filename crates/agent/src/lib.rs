//! Multi-agent task orchestration for taskloop.
//!
//! The [`Orchestrator`] drives a bounded **Gather → Act → Verify** loop:
//!
//! 1. **Gather** related files from the context store, plus feedback left
//!    by the previous iteration
//! 2. **Compact** the store if it is near capacity
//! 3. **Act**: dispatch the task type's workers, in parallel under a
//!    semaphore or one by one
//! 4. **Verify** the results against the task type's validation rules
//!
//! The loop ends when an iteration verifies, when `max_iterations` is
//! exhausted, or when the caller cancels.

pub mod bootstrap;
pub mod dispatch;
pub mod iteration_log;
pub mod orchestrator;
pub mod validation;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bootstrap::{Runtime, default_workers};
pub use dispatch::{Dispatcher, Job, JobOutcome};
pub use iteration_log::IterationLog;
pub use orchestrator::Orchestrator;
pub use validation::{
    CoverageAtLeast, RequiredWorkersReported, RuleOutcome, RuleSet, ValidationInput,
    ValidationRule, rule_fn,
};
pub use workers::{CodeWorker, SearchWorker, TestWorker};
