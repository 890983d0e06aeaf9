use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use cassandra_stress_core::prelude::CancelListener;
use cassandra_stress_summary_model::{RunRecord, RunStatus};

use crate::container::StressTarget;
use crate::metrics::OutputScraper;
use crate::plan::RunDescriptor;

/// Extra wall-clock time a run gets beyond its nominal duration before it is killed. The stress
/// tool needs a moment to ramp up, settle, and print its results.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(30);

/// The stress invocation for one run, fully resolved to a program and argument list so tests
/// can substitute an arbitrary executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl StressCommand {
    /// The cassandra-stress write workload, executed inside the target container.
    pub fn for_run(target: &StressTarget, descriptor: &RunDescriptor) -> Self {
        Self {
            program: "docker".to_string(),
            args: vec![
                "exec".to_string(),
                target.container_name.clone(),
                "cassandra-stress".to_string(),
                "write".to_string(),
                format!("duration={}", descriptor.duration),
                "-rate".to_string(),
                "threads=10".to_string(),
                "-node".to_string(),
                target.node_ip.clone(),
            ],
        }
    }

    pub fn display_line(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Execute one stress run to completion.
///
/// The child process is killed when it outlives the run's duration plus `grace`, or when the
/// batch is cancelled. Output streams are drained into buffers owned exclusively by this run.
/// A spawn failure is returned as a failed record with the cause in its stderr text, never as
/// an orchestrator error, and no exit path leaves the child running.
pub async fn execute(
    descriptor: RunDescriptor,
    command: StressCommand,
    grace: Duration,
    mut cancel: CancelListener,
    scraper: &OutputScraper,
    passthrough_logs: bool,
) -> RunRecord {
    let started_at = Utc::now();
    log::debug!(
        "Starting run {} with command: {}",
        descriptor.index,
        command.display_line()
    );

    let mut child = match Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            log::error!("Failed to launch run {}: {e}", descriptor.index);
            return finish_record(
                &descriptor,
                started_at,
                RunStatus::Failed { code: None },
                String::new(),
                format!("Failed to launch '{}': {e}", command.display_line()),
                scraper,
                passthrough_logs,
            );
        }
    };

    // One reader task per stream so capture keeps up while we wait for the exit, and so each
    // buffer belongs to exactly one run.
    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let ceiling = descriptor.duration.as_std() + grace;
    let waited = tokio::select! {
        status = child.wait() => Waited::Exited(status),
        _ = tokio::time::sleep(ceiling) => Waited::TimedOut,
        _ = cancel.cancelled() => Waited::Cancelled,
    };

    let status = match waited {
        Waited::Exited(Ok(exit)) => {
            if exit.success() {
                RunStatus::Succeeded
            } else {
                RunStatus::Failed { code: exit.code() }
            }
        }
        Waited::Exited(Err(e)) => {
            log::error!("Failed to wait for run {}: {e}", descriptor.index);
            kill_child(&mut child, descriptor.index).await;
            RunStatus::Failed { code: None }
        }
        Waited::TimedOut => {
            log::warn!(
                "Run {} exceeded its duration of {} plus {}s grace, killing it",
                descriptor.index,
                descriptor.duration,
                grace.as_secs()
            );
            kill_child(&mut child, descriptor.index).await;
            RunStatus::TimedOut
        }
        Waited::Cancelled => {
            kill_child(&mut child, descriptor.index).await;
            RunStatus::Cancelled
        }
    };

    let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

    finish_record(
        &descriptor,
        started_at,
        status,
        stdout,
        stderr,
        scraper,
        passthrough_logs,
    )
}

/// `kill` also reaps the child, so no zombie or orphan survives this call.
async fn kill_child(child: &mut tokio::process::Child, index: usize) {
    if let Err(e) = child.kill().await {
        log::warn!("Failed to kill child process of run {index}: {e}");
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            log::warn!("Failed to capture stress process output: {e}");
        }
    }
    buf
}

fn finish_record(
    descriptor: &RunDescriptor,
    started_at: DateTime<Utc>,
    status: RunStatus,
    stdout: String,
    stderr: String,
    scraper: &OutputScraper,
    passthrough_logs: bool,
) -> RunRecord {
    let finished_at = Utc::now();
    let elapsed_secs =
        ((finished_at - started_at).num_milliseconds() as f64 / 1000.0 * 100.0).round() / 100.0;

    if !stderr.is_empty() {
        log::warn!("Run {} stderr:\n{}", descriptor.index, stderr.trim_end());
    }
    if passthrough_logs && !stdout.is_empty() {
        log::info!(
            "Run {} executed with output:\n{}",
            descriptor.index,
            stdout.trim_end()
        );
    }

    // Only the section after the last `Results:` marker is worth keeping; everything before it
    // is per-interval progress noise.
    let results_section = stdout
        .rsplit("Results:")
        .next()
        .unwrap_or_default()
        .to_string();
    let metrics = scraper.scrape(&results_section);

    log::info!(
        "Run {} resolved as {} after {elapsed_secs}s",
        descriptor.index,
        status.kind()
    );

    RunRecord {
        index: descriptor.index,
        duration: descriptor.duration.to_string(),
        duration_secs: descriptor.duration.as_secs(),
        started_at,
        finished_at,
        elapsed_secs,
        status,
        stdout: results_section,
        stderr,
        metrics,
    }
}
