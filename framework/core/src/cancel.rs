use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, Receiver, Sender};

/// Broadcasts a single cancellation signal to any number of listeners.
///
/// The signal is latched, so a listener created after the signal was sent still observes it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(1).0,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation to every listener. Calling this more than once is harmless.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Err(e) = self.sender.send(()) {
            // Only fails when nobody is listening, which is fine.
            log::debug!("No listeners for cancellation signal: {e:?}");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn new_listener(&self) -> CancelListener {
        CancelListener {
            receiver: self.sender.subscribe(),
            cancelled: self.cancelled.clone(),
        }
    }
}

/// A listener handed to a unit of work so it can react to cancellation.
#[derive(Debug)]
pub struct CancelListener {
    receiver: Receiver<()>,
    cancelled: Arc<AtomicBool>,
}

impl Clone for CancelListener {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.resubscribe(),
            cancelled: self.cancelled.clone(),
        }
    }
}

impl CancelListener {
    /// Point in time check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancellation is requested. Safe to race against other futures in a `select!`
    /// so that in-progress work can be abandoned when the signal arrives.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        // A closed channel means the handle is gone and no more work should start, so both
        // outcomes are treated as cancellation.
        let _ = self.receiver.recv().await;
    }
}

/// Returned by operations that were interrupted by the cancellation signal.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct CancellationRequested {
    msg: String,
}

impl Default for CancellationRequested {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by interrupt signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn listener_observes_cancellation() {
        let handle = CancelHandle::new();
        let mut listener = handle.new_listener();

        assert!(!listener.is_cancelled());
        handle.cancel();
        assert!(listener.is_cancelled());

        // Must resolve immediately rather than block.
        tokio::time::timeout(Duration::from_secs(1), listener.cancelled())
            .await
            .expect("cancelled() should resolve after cancel()");
    }

    #[tokio::test]
    async fn late_listener_still_sees_the_signal() {
        let handle = CancelHandle::new();
        handle.cancel();

        let mut listener = handle.new_listener();
        assert!(listener.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), listener.cancelled())
            .await
            .expect("late listener should observe the latched signal");
    }

    #[tokio::test]
    async fn cloned_listeners_are_independent() {
        let handle = CancelHandle::new();
        let mut first = handle.new_listener();
        let mut second = first.clone();

        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), first.cancelled())
            .await
            .expect("first listener should resolve");
        tokio::time::timeout(Duration::from_secs(1), second.cancelled())
            .await
            .expect("second listener should resolve");
    }

    #[tokio::test]
    async fn cancel_twice_is_harmless() {
        let handle = CancelHandle::new();
        let listener = handle.new_listener();
        handle.cancel();
        handle.cancel();
        assert!(listener.is_cancelled());
    }
}
