//! Worker dispatch for the Acting phase.
//!
//! Jobs run concurrently under a semaphore of `max_parallel` permits when
//! there is more than one job and parallelism allows it, otherwise one after
//! another. Each worker call is bounded by the optional operation timeout
//! and raced against the cancellation token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use taskloop_core::error::WorkerError;
use taskloop_core::task::{Task, WorkerResult};
use taskloop_core::worker::Worker;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One worker invocation with its isolated sub-task.
pub struct Job {
    pub worker: Arc<dyn Worker>,
    pub task: Task,
}

/// Outcome of a single job, in dispatch order.
pub struct JobOutcome {
    pub worker: String,
    pub elapsed: Duration,
    pub result: Result<WorkerResult, WorkerError>,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    max_parallel: usize,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// `max_parallel` is clamped to at least one permit.
    pub fn new(max_parallel: usize, timeout: Option<Duration>) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            timeout,
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Run every job and return their outcomes in the order given.
    pub async fn run(&self, jobs: Vec<Job>, cancel: &CancellationToken) -> Vec<JobOutcome> {
        if jobs.len() > 1 && self.max_parallel > 1 {
            self.run_parallel(jobs, cancel).await
        } else {
            let mut outcomes = Vec::with_capacity(jobs.len());
            for job in jobs {
                outcomes.push(run_one(job, self.timeout, cancel.clone()).await);
            }
            outcomes
        }
    }

    async fn run_parallel(&self, jobs: Vec<Job>, cancel: &CancellationToken) -> Vec<JobOutcome> {
        debug!(
            jobs = jobs.len(),
            max_parallel = self.max_parallel,
            "Dispatching workers in parallel"
        );
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let names: Vec<String> = jobs.iter().map(|j| j.worker.name().to_string()).collect();

        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let sem = semaphore.clone();
                let cancel = cancel.clone();
                let timeout = self.timeout;
                tokio::spawn(async move {
                    let name = job.worker.name().to_string();
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return JobOutcome {
                            worker: name.clone(),
                            elapsed: Duration::ZERO,
                            result: Err(WorkerError::Cancelled(name)),
                        };
                    };
                    run_one(job, timeout, cancel).await
                })
            })
            .collect();

        let joined = futures::future::join_all(handles).await;
        joined
            .into_iter()
            .zip(names)
            .map(|(joined, name)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(worker = %name, "Worker task panicked or was aborted: {e}");
                    JobOutcome {
                        worker: name.clone(),
                        elapsed: Duration::ZERO,
                        result: Err(WorkerError::Failed {
                            worker: name,
                            reason: e.to_string(),
                        }),
                    }
                }
            })
            .collect()
    }
}

async fn run_one(job: Job, timeout: Option<Duration>, cancel: CancellationToken) -> JobOutcome {
    let name = job.worker.name().to_string();
    let started = Instant::now();

    if cancel.is_cancelled() {
        return JobOutcome {
            worker: name.clone(),
            elapsed: Duration::ZERO,
            result: Err(WorkerError::Cancelled(name)),
        };
    }

    debug!(worker = %name, task_id = %job.task.id, "Running worker");
    let call = job.worker.execute(job.task, cancel.clone());

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkerError::Cancelled(name.clone())),
        result = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(WorkerError::Timeout {
                        worker: name.clone(),
                        timeout_secs: limit.as_secs(),
                    })),
                None => call.await,
            }
        } => result,
    };

    JobOutcome {
        worker: name,
        elapsed: started.elapsed(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ConcurrencyProbe, FailingWorker, SleepyWorker};

    fn jobs(workers: Vec<Arc<dyn Worker>>) -> Vec<Job> {
        let parent = Task::new("code", "dispatch test");
        workers
            .into_iter()
            .map(|w| Job {
                task: parent.subtask(w.name(), 1),
                worker: w,
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_dispatch_respects_permit_count() {
        let probe = ConcurrencyProbe::new();
        let workers: Vec<Arc<dyn Worker>> = (0..3)
            .map(|i| probe.worker(format!("w{i}"), Duration::from_millis(80)))
            .collect();

        let dispatcher = Dispatcher::new(2, None);
        let outcomes = dispatcher.run(jobs(workers), &CancellationToken::new()).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert_eq!(probe.max_seen(), 2);
    }

    #[tokio::test]
    async fn sequential_when_parallelism_is_one() {
        let probe = ConcurrencyProbe::new();
        let workers: Vec<Arc<dyn Worker>> = (0..3)
            .map(|i| probe.worker(format!("w{i}"), Duration::from_millis(10)))
            .collect();

        let outcomes = Dispatcher::new(1, None)
            .run(jobs(workers), &CancellationToken::new())
            .await;

        assert_eq!(probe.max_seen(), 1);
        let order: Vec<&str> = outcomes.iter().map(|o| o.worker.as_str()).collect();
        assert_eq!(order, vec!["w0", "w1", "w2"]);
    }

    #[tokio::test]
    async fn failing_worker_does_not_affect_others() {
        let probe = ConcurrencyProbe::new();
        let workers: Vec<Arc<dyn Worker>> = vec![
            probe.worker("ok", Duration::from_millis(5)),
            Arc::new(FailingWorker::new("broken")),
        ];

        let outcomes = Dispatcher::new(3, None)
            .run(jobs(workers), &CancellationToken::new())
            .await;

        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(WorkerError::Failed { .. })));
    }

    #[tokio::test]
    async fn timeout_becomes_worker_error() {
        let workers: Vec<Arc<dyn Worker>> =
            vec![Arc::new(SleepyWorker::new("slow", Duration::from_secs(30)))];

        let outcomes = Dispatcher::new(1, Some(Duration::from_millis(20)))
            .run(jobs(workers), &CancellationToken::new())
            .await;

        assert!(matches!(
            outcomes[0].result,
            Err(WorkerError::Timeout { ref worker, .. }) if worker == "slow"
        ));
    }

    #[tokio::test]
    async fn cancellation_aborts_outstanding_workers() {
        let workers: Vec<Arc<dyn Worker>> = vec![
            Arc::new(SleepyWorker::new("a", Duration::from_secs(30))),
            Arc::new(SleepyWorker::new("b", Duration::from_secs(30))),
        ];
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let outcomes = Dispatcher::new(2, None).run(jobs(workers), &cancel).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcomes.iter().all(|o| o
            .result
            .as_ref()
            .is_err_and(|e| e.is_cancelled())));
    }
}
