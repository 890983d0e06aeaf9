use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use cassandra_stress_core::prelude::CancelListener;

/// Displays a progress bar tracking how many runs of the batch have resolved.
pub fn start_progress(
    total_runs: u64,
    completed_runs: Arc<AtomicUsize>,
    cancel_listener: CancelListener,
) {
    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let pb = ProgressBar::new(total_runs);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} runs [{elapsed_precise}]",
                )
                .expect("Failed to set progress style")
                .progress_chars("#>-"),
            );

            loop {
                if cancel_listener.is_cancelled() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let completed = completed_runs.load(Ordering::SeqCst) as u64;
                pb.set_position(completed.min(total_runs));
                if completed >= total_runs {
                    pb.finish();
                    break;
                }
                std::thread::sleep(Duration::from_millis(250));
            }
        })
        .expect("Failed to start progress thread");
}
