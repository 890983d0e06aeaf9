use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use cassandra_stress_core::prelude::CancelListener;

/// Monitor the orchestrator's own resource usage and report high CPU load.
///
/// The orchestrator runs on the same host as the container under test, so if it eats CPU it
/// competes with the workload being measured. This won't stop the batch, it just warns the user
/// that the numbers might be affected.
pub(crate) fn start_monitor(cancel_listener: CancelListener) {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu_usage();
            let cpu_count = sys.cpus().len().max(1);

            loop {
                if cancel_listener.is_cancelled() {
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                if let Some(process) = sys.process(this_process_pid) {
                    let usage = process.cpu_usage() / cpu_count as f32;
                    if usage > 10.0 {
                        log::warn!(
                            "High CPU usage detected. The orchestrator is using {usage:.2}% of the CPU, with {cpu_count} available cores"
                        );
                    }
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_secs(1)));
            }
        })
        .expect("Failed to start monitor thread");
}
