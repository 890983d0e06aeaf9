use tokio::signal;

use cassandra_stress_core::prelude::CancelHandle;

/// Install a Ctrl-C listener that cancels the batch: in-flight runs are killed, pending runs
/// are abandoned, and the partial results collected so far are still reported.
pub(crate) fn start_cancel_listener(runtime: &tokio::runtime::Runtime) -> CancelHandle {
    let handle = CancelHandle::new();

    let cancel = handle.clone();
    runtime.spawn(async move {
        if signal::ctrl_c().await.is_err() {
            log::error!("Failed to listen for the Ctrl-C signal");
            return;
        }
        println!("Received interrupt, cancelling stress runs...");
        cancel.cancel();
    });

    handle
}
