//! Self-rescheduling periodic task
//!
//! One task sleeps, runs a pass, and uses the delay the pass returns for the
//! next sleep. Passes therefore never overlap. Cancellation interrupts the
//! sleep but never a running pass: `cancel()` resolves only once the task has
//! exited.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Handle to a running periodic task
#[derive(Debug)]
pub struct PeriodicSchedule {
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicSchedule {
    /// Spawn the task; the first pass runs after `first_delay`
    ///
    /// `pass` returns the delay before the following pass.
    pub fn spawn<F, Fut>(first_delay: Duration, mut pass: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Duration> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                debug!(delay_ms = delay.as_millis() as u64, "Next pass scheduled");

                tokio::select! {
                    biased;
                    // Err means the sender is gone, which also ends the task
                    _ = cancel_rx.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                delay = pass().await;

                if *cancel_rx.borrow() {
                    break;
                }
            }
            debug!("Periodic task exited");
        });

        Self { cancel_tx, handle }
    }

    /// Stop the task and wait for any running pass to complete
    pub async fn cancel(self) {
        // A send error only means the task already exited
        let _ = self.cancel_tx.send(true);

        if let Err(e) = self.handle.await {
            error!(error = %e, "Periodic task ended abnormally");
        }
    }
}
