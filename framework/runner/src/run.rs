use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use anyhow::{bail, Context};

use cassandra_stress_core::prelude::{CancelListener, CancellationRequested};
use cassandra_stress_summary_model::{export_report, AggregateReport, BatchConfig};

use crate::cli::StressCli;
use crate::container;
use crate::metrics::{default_params, OutputScraper};
use crate::monitor::start_monitor;
use crate::plan::{RunDescriptor, RunPlan};
use crate::process::{self, StressCommand, DEFAULT_GRACE};
use crate::progress::start_progress;
use crate::scheduler;
use crate::signal::start_cancel_listener;
use crate::types::StressResult;

/// Run a batch of stress tests described by the CLI intent.
///
/// Plan building happens first so a malformed invocation fails before anything is spawned.
/// Run-level failures never surface as errors here; they are data in the aggregate report.
pub fn run(cli: StressCli) -> StressResult<()> {
    let plan = RunPlan::from_cli(&cli)?;
    let max_concurrency = cli.max_concurrency.unwrap_or(plan.len());
    if max_concurrency == 0 {
        bail!("--max-concurrency must be a positive integer");
    }

    let run_id = nanoid::nanoid!();
    log::info!(
        "Starting stress batch {run_id}: {} run(s) against container '{}', at most {} in flight",
        plan.len(),
        cli.container_name,
        max_concurrency
    );

    let config = BatchConfig {
        container_name: cli.container_name.clone(),
        duration_tokens: plan.duration_tokens(),
        max_concurrency,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let cancel = start_cancel_listener(&runtime);

    // The container may take a while to come up, so this wait is cancellable too.
    let mut cancel_listener = cancel.new_listener();
    let target = runtime.block_on(async {
        tokio::select! {
            target = container::prepare_target(&cli.container_name) => target,
            _ = cancel_listener.cancelled() => {
                Err(anyhow::anyhow!(CancellationRequested::default()))
            }
        }
    })?;

    let completed_runs = Arc::new(AtomicUsize::new(0));
    if !cli.no_progress {
        start_progress(
            plan.len() as u64,
            completed_runs.clone(),
            cancel.new_listener(),
        );
    }
    start_monitor(cancel.new_listener());

    let scraper = Arc::new(OutputScraper::new(&default_params())?);
    let target = Arc::new(target);
    let stress_logs = cli.stress_logs;
    let executor = move |descriptor: RunDescriptor, listener: CancelListener| {
        let scraper = scraper.clone();
        let target = target.clone();
        async move {
            let command = StressCommand::for_run(&target, &descriptor);
            process::execute(
                descriptor,
                command,
                DEFAULT_GRACE,
                listener,
                &scraper,
                stress_logs,
            )
            .await
        }
    };

    let outcome = runtime.block_on(scheduler::run_plan(
        plan,
        max_concurrency,
        cancel.clone(),
        completed_runs,
        executor,
    ))?;

    // Stops the progress and monitor threads now that the batch has resolved.
    cancel.cancel();

    let report = AggregateReport::from_records(run_id, &config, outcome.records, outcome.cancelled);
    log::info!(
        "Stress tests statistics:\n{}",
        serde_json::to_string_pretty(&report)?
    );

    if let Some(dir) = &cli.export_to_json {
        let path = export_report(&report, dir)?;
        log::info!("Exported stats to {}", path.display());
    }

    Ok(())
}
