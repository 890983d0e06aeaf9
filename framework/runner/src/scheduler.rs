use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use cassandra_stress_core::prelude::{CancelHandle, CancelListener};
use cassandra_stress_summary_model::RunRecord;

use crate::plan::{RunDescriptor, RunPlan};

/// What the scheduler resolved: one record per run that was dispatched, ordered by plan index,
/// and whether the batch was cut short by cancellation.
#[derive(Debug)]
pub struct SchedulerOutcome {
    pub records: Vec<RunRecord>,
    pub cancelled: bool,
}

/// Drive the plan through the given executor with at most `max_concurrency` runs in flight.
///
/// A fixed set of workers pulls descriptors from a shared queue in plan order and pushes each
/// resolved record to a single collector, so a freed slot immediately picks up the next pending
/// run and no run's outcome can block or abort a sibling. On cancellation, workers stop pulling
/// and in-flight runs are left to resolve themselves via their cancel listeners; the partial
/// record set is still returned.
///
/// The executor is a plain async function value so tests can substitute fakes for real
/// subprocess invocation. `completed_runs` is bumped once per resolved run, for progress
/// reporting.
///
/// This only errors on bookkeeping defects (a worker panicking), never on a run's outcome.
pub async fn run_plan<F, Fut>(
    plan: RunPlan,
    max_concurrency: usize,
    cancel: CancelHandle,
    completed_runs: Arc<AtomicUsize>,
    execute: F,
) -> anyhow::Result<SchedulerOutcome>
where
    F: Fn(RunDescriptor, CancelListener) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = RunRecord> + Send + 'static,
{
    if max_concurrency == 0 {
        bail!("max concurrency must be a positive integer");
    }

    let total = plan.len();
    let workers = max_concurrency.min(total);
    log::info!("Dispatching {total} run(s) across {workers} worker(s)");

    let pending = Arc::new(Mutex::new(
        plan.into_descriptors().into_iter().collect::<VecDeque<_>>(),
    ));
    let (results_tx, mut results_rx) = mpsc::unbounded_channel();

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let pending = pending.clone();
        let results_tx = results_tx.clone();
        let execute = execute.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    log::debug!("Worker {worker_id} stopping, batch cancelled");
                    break;
                }
                let Some(descriptor) = pending.lock().pop_front() else {
                    break;
                };
                let record = execute(descriptor, cancel.new_listener()).await;
                if results_tx.send(record).is_err() {
                    // Collector is gone, nothing left to do.
                    break;
                }
            }
        }));
    }
    drop(results_tx);

    // Single writer: only this loop appends, exactly once per completion event.
    let mut records = Vec::with_capacity(total);
    while let Some(record) = results_rx.recv().await {
        completed_runs.fetch_add(1, Ordering::SeqCst);
        records.push(record);
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| anyhow!("Stress worker panicked: {e:?}"))?;
    }

    // Completion order is not plan order; the report is.
    records.sort_by_key(|record| record.index);

    Ok(SchedulerOutcome {
        records,
        cancelled: cancel.is_cancelled(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cassandra_stress_summary_model::RunStatus;
    use chrono::Utc;
    use std::time::Duration;

    fn plan(count: usize) -> RunPlan {
        RunPlan::uniform(
            count,
            "1s".parse().expect("test token should parse"),
            "some-scylla",
        )
        .expect("valid plan")
    }

    fn record(descriptor: &RunDescriptor, status: RunStatus) -> RunRecord {
        let now = Utc::now();
        RunRecord {
            index: descriptor.index,
            duration: descriptor.duration.to_string(),
            duration_secs: descriptor.duration.as_secs(),
            started_at: now,
            finished_at: now,
            elapsed_secs: 0.0,
            status,
            stdout: String::new(),
            stderr: String::new(),
            metrics: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrency_bound_is_never_exceeded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let executor = {
            let in_flight = in_flight.clone();
            let high_water = high_water.clone();
            move |descriptor: RunDescriptor, _cancel: CancelListener| {
                let in_flight = in_flight.clone();
                let high_water = high_water.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    high_water.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    record(&descriptor, RunStatus::Succeeded)
                }
            }
        };

        let cancel = CancelHandle::new();
        let outcome = run_plan(
            plan(8),
            3,
            cancel.clone(),
            Arc::new(AtomicUsize::new(0)),
            executor,
        )
        .await
        .expect("scheduler should not fail");

        assert_eq!(outcome.records.len(), 8);
        assert!(!outcome.cancelled);
        assert!(
            high_water.load(Ordering::SeqCst) <= 3,
            "at most 3 runs may be in flight, saw {}",
            high_water.load(Ordering::SeqCst)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn records_are_ordered_by_plan_index_not_completion() {
        // Later runs finish first.
        let executor = |descriptor: RunDescriptor, _cancel: CancelListener| async move {
            let delay = 40 * (4 - descriptor.index as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            record(&descriptor, RunStatus::Succeeded)
        };

        let cancel = CancelHandle::new();
        let outcome = run_plan(
            plan(4),
            4,
            cancel.clone(),
            Arc::new(AtomicUsize::new(0)),
            executor,
        )
        .await
        .expect("scheduler should not fail");

        let indices: Vec<usize> = outcome.records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_failed_run_does_not_abort_the_rest() {
        let executor = |descriptor: RunDescriptor, _cancel: CancelListener| async move {
            let status = if descriptor.index == 2 {
                RunStatus::Failed { code: Some(1) }
            } else {
                RunStatus::Succeeded
            };
            record(&descriptor, status)
        };

        let cancel = CancelHandle::new();
        let outcome = run_plan(
            plan(5),
            2,
            cancel.clone(),
            Arc::new(AtomicUsize::new(0)),
            executor,
        )
        .await
        .expect("scheduler should not fail");

        assert_eq!(outcome.records.len(), 5);
        for record in &outcome.records {
            if record.index == 2 {
                assert_eq!(record.status, RunStatus::Failed { code: Some(1) });
            } else {
                assert_eq!(record.status, RunStatus::Succeeded);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancellation_stops_dispatch_and_returns_partial_results() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel::<usize>();

        // In-flight runs hold until cancelled, like a real stress process being killed.
        let executor = move |descriptor: RunDescriptor, mut cancel: CancelListener| {
            let started_tx = started_tx.clone();
            async move {
                let _ = started_tx.send(descriptor.index);
                cancel.cancelled().await;
                record(&descriptor, RunStatus::Cancelled)
            }
        };

        let cancel = CancelHandle::new();
        let completed = Arc::new(AtomicUsize::new(0));
        let scheduler = tokio::spawn(run_plan(
            plan(5),
            2,
            cancel.clone(),
            completed.clone(),
            executor,
        ));

        // Wait for both slots to fill, then interrupt the batch.
        for _ in 0..2 {
            started_rx.recv().await.expect("a run should have started");
        }
        cancel.cancel();

        let outcome = scheduler
            .await
            .expect("scheduler task should not panic")
            .expect("scheduler should not fail");

        assert!(outcome.cancelled);
        assert_eq!(outcome.records.len(), 2, "pending runs must be abandoned");
        assert!(outcome
            .records
            .iter()
            .all(|r| r.status == RunStatus::Cancelled));
        assert_eq!(completed.load(Ordering::SeqCst), 2);
        assert!(
            started_rx.try_recv().is_err(),
            "no further dispatch after cancellation"
        );
    }

    #[tokio::test]
    async fn zero_concurrency_is_a_configuration_error() {
        let executor = |descriptor: RunDescriptor, _cancel: CancelListener| async move {
            record(&descriptor, RunStatus::Succeeded)
        };
        let cancel = CancelHandle::new();
        let result = run_plan(
            plan(1),
            0,
            cancel.clone(),
            Arc::new(AtomicUsize::new(0)),
            executor,
        )
        .await;
        assert!(result.is_err());
    }
}
