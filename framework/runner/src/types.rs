/// Recommended error type for the orchestrator's `main` function. Compatible with the error
/// types used throughout the runner so `?` propagates cleanly.
pub type StressResult<T> = anyhow::Result<T>;
