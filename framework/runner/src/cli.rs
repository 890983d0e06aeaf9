use std::path::PathBuf;

use clap::Parser;

/// Run concurrent cassandra-stress tests against a ScyllaDB container.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
pub struct StressCli {
    /// Number of parallel runs and their shared duration, e.g. `--number-of-runs-and-duration 3 10s`.
    ///
    /// Mutually exclusive with `--durations`.
    #[clap(long, num_args = 2, value_names = ["COUNT", "DURATION"], conflicts_with = "durations")]
    pub number_of_runs_and_duration: Option<Vec<String>>,

    /// One duration per run, e.g. `--durations 1s 2m 10s`. Runs execute in the given order.
    ///
    /// Mutually exclusive with `--number-of-runs-and-duration`.
    #[clap(long, num_args = 1..)]
    pub durations: Option<Vec<String>>,

    /// Name of the ScyllaDB container to run against
    #[clap(long, default_value = "some-scylla")]
    pub container_name: String,

    /// Maximum number of stress processes in flight at once.
    ///
    /// Defaults to the plan size, i.e. every run starts immediately.
    #[clap(long)]
    pub max_concurrency: Option<usize>,

    /// Export the aggregated stats to a JSON file in the given directory
    #[clap(long, value_name = "RESULTS_DIR", num_args = 0..=1, default_missing_value = "results")]
    pub export_to_json: Option<PathBuf>,

    /// Log the full cassandra-stress output of every run.
    ///
    /// Without this flag only the scraped statistics and per-run outcomes are logged.
    #[clap(long, default_value = "false")]
    pub stress_logs: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,
}
