//! Fan-Out Executor (C2).
//!
//! Runs a set of backend reads in parallel with bounded concurrency,
//! preserving input (priority) order in the result, and propagating
//! cancellation when the caller's deadline fires.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::backend::RequestContext;
use crate::error::BackendError;

/// Default cap on concurrently in-flight backend sub-requests (§4.2).
pub const DEFAULT_MAX_PARALLEL: usize = 16;

/// The grace period the executor allows in-flight work to unwind after a
/// deadline fires, before giving up and returning anyway (§4.2, §5).
pub const CANCELLATION_GRACE: Duration = Duration::from_millis(100);

/// Errors the fan-out executor itself can return (distinct from individual
/// per-backend [`BackendError`]s, which are recorded in [`Diagnostics`]).
#[derive(Debug, Error, Clone)]
pub enum FanOutError {
    /// The aggregate deadline fired before every job completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// Every job failed with a non-skippable error.
    #[error("{0}")]
    AllBackendsFailed(String),
}

/// One outcome of a per-backend job: its result, or a note that it was
/// skipped (`NotFound`/`Unimplemented`) rather than failed.
#[derive(Debug, Clone)]
pub enum JobOutcome<T> {
    /// The job produced a value.
    Ok(T),
    /// The job's backend doesn't have this data or doesn't support the call.
    Skipped,
    /// The job failed for a reason other than "no data"/"unsupported".
    Failed(BackendError),
}

/// Diagnostic record of one backend's outcome, surfaced only when the
/// aggregate as a whole succeeds (§7).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The backend's name.
    pub backend_name: String,
    /// What happened.
    pub outcome: DiagnosticOutcome,
}

/// What happened to one backend's sub-request.
#[derive(Debug, Clone)]
pub enum DiagnosticOutcome {
    /// Completed successfully.
    Succeeded,
    /// Skipped (`NotFound`/`Unimplemented`).
    Skipped,
    /// Failed with a recorded error.
    Failed(String),
}

/// A unit of fan-out work bound to one backend.
pub struct FanOutJob<T> {
    /// The backend's name, for diagnostics.
    pub backend_name: String,
    /// The async work to run.
    pub work: Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send>>,
}

impl<T> FanOutJob<T> {
    /// Wraps a future as a fan-out job for the named backend.
    pub fn new(
        backend_name: impl Into<String>,
        work: impl Future<Output = Result<T, BackendError>> + Send + 'static,
    ) -> Self {
        Self {
            backend_name: backend_name.into(),
            work: Box::pin(work),
        }
    }
}

/// The outcome of a full fan-out run: per-job outcomes in input order, plus
/// diagnostics for every backend that didn't simply succeed.
pub struct FanOutResult<T> {
    /// One entry per input job, in the same order the jobs were submitted —
    /// this is how downstream merging relies on priority ordering (§4.2, §5).
    pub outcomes: Vec<JobOutcome<T>>,
    /// Diagnostics for skipped/failed backends.
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs N sub-requests in parallel with at most `max_parallel` active at
/// once, honoring a shared deadline.
pub struct FanOutExecutor {
    max_parallel: usize,
}

impl Default for FanOutExecutor {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

impl FanOutExecutor {
    /// Creates an executor with the default concurrency cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor with a custom concurrency cap.
    pub fn with_max_parallel(max_parallel: usize) -> Self {
        Self { max_parallel }
    }

    /// Runs every job, returning results in input order.
    ///
    /// If `ctx`'s deadline fires before every job completes, in-flight jobs
    /// are abandoned (their futures dropped, which also drops any
    /// backend-side cancellation handle the caller embedded in `ctx`), and
    /// this returns `Err(FanOutError::DeadlineExceeded)` within
    /// [`CANCELLATION_GRACE`] of the deadline. Partial results are discarded
    /// per §4.2/§5 — callers must not hand out half-collected outcomes.
    pub async fn run<T>(
        &self,
        jobs: Vec<FanOutJob<T>>,
        ctx: &RequestContext,
    ) -> Result<FanOutResult<T>, FanOutError>
    where
        T: Send + 'static,
    {
        if jobs.is_empty() {
            return Ok(FanOutResult {
                outcomes: Vec::new(),
                diagnostics: Vec::new(),
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.max_parallel.max(1)));
        let mut join_set: JoinSet<(usize, String, Result<T, BackendError>)> = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let permit_source = Arc::clone(&semaphore);
            let backend_name = job.backend_name.clone();
            let work = job.work;
            join_set.spawn(async move {
                let _permit = permit_source.acquire_owned().await;
                let result = work.await;
                (index, backend_name, result)
            });
        }

        let deadline_fut = tokio::time::sleep(ctx.remaining());
        tokio::pin!(deadline_fut);

        let mut collected: Vec<Option<(String, Result<T, BackendError>)>> =
            (0..join_set.len()).map(|_| None).collect();
        let expected = collected.len();
        let mut completed = 0usize;

        loop {
            if completed == expected {
                break;
            }
            tokio::select! {
                biased;
                _ = &mut deadline_fut => {
                    ctx.cancellation.cancel();
                    // Allow the grace period for anything that finishes almost immediately,
                    // then give up unconditionally.
                    let grace = tokio::time::sleep(CANCELLATION_GRACE);
                    tokio::pin!(grace);
                    loop {
                        tokio::select! {
                            _ = &mut grace => break,
                            joined = join_set.join_next() => {
                                if joined.is_none() {
                                    break;
                                }
                            }
                        }
                    }
                    join_set.abort_all();
                    return Err(FanOutError::DeadlineExceeded);
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((index, backend_name, result))) => {
                            collected[index] = Some((backend_name, result));
                            completed += 1;
                        }
                        Some(Err(_join_err)) => {
                            // A task panicked or was cancelled; treat as completed-with-no-slot.
                            completed += 1;
                        }
                        None => break,
                    }
                }
            }
        }

        let mut outcomes = Vec::with_capacity(expected);
        let mut diagnostics = Vec::new();
        let mut any_succeeded = false;
        let mut first_failure: Option<String> = None;

        for slot in collected {
            match slot {
                None => {
                    outcomes.push(JobOutcome::Failed(BackendError::Unavailable {
                        backend: "unknown".to_string(),
                        reason: "task did not complete".to_string(),
                    }));
                }
                Some((backend_name, Ok(value))) => {
                    any_succeeded = true;
                    diagnostics.push(Diagnostic {
                        backend_name,
                        outcome: DiagnosticOutcome::Succeeded,
                    });
                    outcomes.push(JobOutcome::Ok(value));
                }
                Some((backend_name, Err(err))) if err.is_skippable() => {
                    diagnostics.push(Diagnostic {
                        backend_name,
                        outcome: DiagnosticOutcome::Skipped,
                    });
                    outcomes.push(JobOutcome::Skipped);
                }
                Some((backend_name, Err(err))) => {
                    if first_failure.is_none() {
                        first_failure = Some(err.to_string());
                    }
                    diagnostics.push(Diagnostic {
                        backend_name,
                        outcome: DiagnosticOutcome::Failed(err.to_string()),
                    });
                    outcomes.push(JobOutcome::Failed(err));
                }
            }
        }

        if !any_succeeded {
            if let Some(msg) = first_failure {
                return Err(FanOutError::AllBackendsFailed(msg));
            }
        }

        Ok(FanOutResult {
            outcomes,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn ctx(deadline_ms: u64) -> RequestContext {
        RequestContext::new("test", Instant::now() + Duration::from_millis(deadline_ms))
    }

    #[tokio::test]
    async fn preserves_input_order_regardless_of_completion_order() {
        let jobs = vec![
            FanOutJob::new("slow", async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, BackendError>(1)
            }),
            FanOutJob::new("fast", async { Ok::<_, BackendError>(2) }),
        ];
        let result = FanOutExecutor::new().run(jobs, &ctx(1000)).await.unwrap();
        match (&result.outcomes[0], &result.outcomes[1]) {
            (JobOutcome::Ok(a), JobOutcome::Ok(b)) => {
                assert_eq!(*a, 1);
                assert_eq!(*b, 2);
            }
            _ => panic!("expected both jobs to succeed"),
        }
    }

    #[tokio::test]
    async fn skippable_errors_do_not_fail_the_aggregate() {
        let jobs = vec![
            FanOutJob::new("b1", async {
                Err(BackendError::NotFound {
                    backend: "b1".into(),
                })
            }),
            FanOutJob::new("b2", async { Ok::<_, BackendError>(7) }),
        ];
        let result = FanOutExecutor::new().run(jobs, &ctx(1000)).await.unwrap();
        assert!(matches!(result.outcomes[0], JobOutcome::Skipped));
        assert!(matches!(result.outcomes[1], JobOutcome::Ok(7)));
    }

    #[tokio::test]
    async fn all_backends_failing_surfaces_first_error() {
        let jobs: Vec<FanOutJob<i32>> = vec![
            FanOutJob::new("b1", async {
                Err(BackendError::Unavailable {
                    backend: "b1".into(),
                    reason: "down".into(),
                })
            }),
            FanOutJob::new("b2", async {
                Err(BackendError::Unavailable {
                    backend: "b2".into(),
                    reason: "down".into(),
                })
            }),
        ];
        let result = FanOutExecutor::new().run(jobs, &ctx(1000)).await;
        assert!(matches!(result, Err(FanOutError::AllBackendsFailed(_))));
    }

    #[tokio::test]
    async fn deadline_exceeded_within_grace_period() {
        let jobs = vec![FanOutJob::new("hangs", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, BackendError>(1)
        })];
        let start = Instant::now();
        let result = FanOutExecutor::new().run(jobs, &ctx(50)).await;
        assert!(matches!(result, Err(FanOutError::DeadlineExceeded)));
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn empty_job_list_returns_immediately() {
        let result: FanOutResult<i32> = FanOutExecutor::new()
            .run(Vec::new(), &ctx(1000))
            .await
            .unwrap();
        assert!(result.outcomes.is_empty());
    }
}
