use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub mod stats;

/// Parameter names scraped from cassandra-stress output, as they appear in its `Results:` section.
pub const OP_RATE: &str = "Op rate";
pub const LATENCY_MEAN: &str = "Latency mean";
pub const LATENCY_P99: &str = "Latency 99th percentile";
pub const LATENCY_MAX: &str = "Latency max";

/// Terminal state of a single stress run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunStatus {
    /// The stress process exited with code 0.
    Succeeded,
    /// The stress process exited with a non-zero code, was killed by a signal (`code: None`),
    /// or could not be launched at all (`code: None`, cause recorded in the run's stderr).
    Failed { code: Option<i32> },
    /// The stress process outlived its duration plus the grace period and was killed.
    TimedOut,
    /// The run was terminated by the batch-wide cancellation signal.
    Cancelled,
}

impl RunStatus {
    pub fn kind(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed { .. } => "failed",
            RunStatus::TimedOut => "timed_out",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }
}

/// Statistics scraped from one run's cassandra-stress output.
///
/// Keyed by parameter name so callers can collect parameters beyond the default set without
/// changing the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressMetrics {
    pub values: BTreeMap<String, f64>,
}

impl StressMetrics {
    pub fn insert(&mut self, param: &str, value: f64) {
        self.values.insert(param.to_string(), value);
    }

    pub fn get(&self, param: &str) -> Option<f64> {
        self.values.get(param).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn op_rate(&self) -> Option<f64> {
        self.get(OP_RATE)
    }

    pub fn latency_mean(&self) -> Option<f64> {
        self.get(LATENCY_MEAN)
    }

    pub fn latency_p99(&self) -> Option<f64> {
        self.get(LATENCY_P99)
    }

    pub fn latency_max(&self) -> Option<f64> {
        self.get(LATENCY_MAX)
    }
}

/// Everything recorded about one stress run. Write-once: created by the process runner when the
/// run resolves and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Position of this run in the plan. The aggregate report is ordered by this index.
    pub index: usize,
    /// The duration token the run was configured with, e.g. `10s`.
    pub duration: String,
    pub duration_secs: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Observed wall-clock time of the run in seconds, rounded to two decimal places.
    pub elapsed_secs: f64,
    pub status: RunStatus,
    /// The run's captured standard output, reduced to the text after the last `Results:` marker
    /// when that marker is present.
    pub stdout: String,
    pub stderr: String,
    /// Scraped statistics, or `None` when the output could not be parsed. The raw text above is
    /// kept either way.
    pub metrics: Option<StressMetrics>,
}

/// The configuration a batch of runs was started with, used for the report fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub container_name: String,
    /// Duration tokens of the full plan, in plan order.
    pub duration_tokens: Vec<String>,
    pub max_concurrency: usize,
}

impl BatchConfig {
    /// Compute a fingerprint identifying this batch configuration, so reports from repeated
    /// invocations of the same plan can be matched up. Computed with [`sha3::Sha3_256`].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.container_name.as_bytes());
        for token in &self.duration_tokens {
            Digest::update(&mut hasher, token.as_bytes());
        }
        Digest::update(&mut hasher, self.max_concurrency.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// The terminal artifact of a batch: per-run detail plus summary statistics, built once after
/// the scheduler has resolved every descriptor it was going to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Unique id for this invocation of the orchestrator.
    pub run_id: String,
    /// Fingerprint of the batch configuration, see [`BatchConfig::fingerprint`].
    pub fingerprint: String,
    pub generated_at: DateTime<Utc>,
    pub container_name: String,
    /// Duration tokens of the full plan, including runs that never started due to cancellation.
    pub durations: Vec<String>,
    pub max_concurrency: usize,
    /// Number of runs in the plan.
    pub planned_runs: usize,
    /// Number of runs that actually resolved. Less than `planned_runs` only when the batch was
    /// cancelled mid-plan.
    pub total_runs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled_runs: usize,
    /// Runs whose output yielded no metrics. They are counted above but excluded from the
    /// numeric summaries below.
    pub unparsed: usize,
    /// True when the batch was interrupted before the plan drained.
    pub batch_cancelled: bool,
    pub op_rate_sum: String,
    pub average_latency_mean: String,
    pub average_latency_p99: String,
    pub latency_max_std_dev: String,
    /// Full per-run detail, ordered by plan index.
    pub per_run: Vec<RunRecord>,
}

impl AggregateReport {
    pub fn from_records(
        run_id: String,
        config: &BatchConfig,
        records: Vec<RunRecord>,
        batch_cancelled: bool,
    ) -> Self {
        let counts = records.iter().counts_by(|record| record.status.kind());
        let unparsed = records
            .iter()
            .filter(|record| record.metrics.is_none())
            .count();

        let op_rates = metric_values(&records, |m| m.op_rate());
        let latency_means = metric_values(&records, |m| m.latency_mean());
        let latency_p99s = metric_values(&records, |m| m.latency_p99());
        let latency_maxes = metric_values(&records, |m| m.latency_max());

        Self {
            run_id,
            fingerprint: config.fingerprint(),
            generated_at: Utc::now(),
            container_name: config.container_name.clone(),
            durations: config.duration_tokens.clone(),
            max_concurrency: config.max_concurrency,
            planned_runs: config.duration_tokens.len(),
            total_runs: records.len(),
            succeeded: counts.get("succeeded").copied().unwrap_or(0),
            failed: counts.get("failed").copied().unwrap_or(0),
            timed_out: counts.get("timed_out").copied().unwrap_or(0),
            cancelled_runs: counts.get("cancelled").copied().unwrap_or(0),
            unparsed,
            batch_cancelled,
            op_rate_sum: stats::sum(&op_rates, "op/s"),
            average_latency_mean: stats::average(&latency_means, "ms"),
            average_latency_p99: stats::average(&latency_p99s, "ms"),
            latency_max_std_dev: stats::std_deviation(&latency_maxes, "ms"),
            per_run: records,
        }
    }
}

fn metric_values(records: &[RunRecord], pick: impl Fn(&StressMetrics) -> Option<f64>) -> Vec<f64> {
    records
        .iter()
        .filter_map(|record| record.metrics.as_ref().and_then(&pick))
        .collect()
}

/// Serialize the report as pretty-printed JSON to the given writer.
pub fn store_report(report: &AggregateReport, writer: &mut impl Write) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Write the report to `<dir>/scylla_stats_<HH_MM_SS_yy_mm_dd>.json`, creating the directory if
/// needed. Returns the path of the written file.
pub fn export_report(report: &AggregateReport, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let file_name = format!(
        "scylla_stats_{}.json",
        report.generated_at.format("%H_%M_%S_%y_%m_%d")
    );
    let path = dir.join(file_name);
    let mut file = std::fs::File::create(&path)?;
    store_report(report, &mut file)?;
    Ok(path)
}

/// Read a report back from JSON, e.g. for downstream tooling.
pub fn load_report(reader: impl Read) -> anyhow::Result<AggregateReport> {
    Ok(serde_json::from_reader(reader)?)
}
