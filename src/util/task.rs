// src/util/task.rs
// Background polling loop shared by the valve manager, flow sensor and heart beat

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{log_debug, log_error, log_info};

/// Runs `work` on the blocking pool, then sleeps `interval`, until stopped.
///
/// Runs never overlap. `stop` waits for the current run to finish, so the
/// caller sees a quiesced loop when it returns.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: &'static str, interval: Duration, work: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let work = Arc::new(work);

        let handle = tokio::spawn(async move {
            log_info!(task = name, interval_secs = interval.as_secs(), "Starting process loop");

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let run = work.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || (*run)()).await {
                    log_error!(task = name, error = %e, "Process loop iteration panicked");
                }

                log_debug!(task = name, "Sleeping for {} second(s)", interval.as_secs());

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = shutdown_rx.changed() => {
                        // Handle dropped without stop()
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            log_info!(task = name, "Ending process loop");
        });

        Self {
            name,
            shutdown_tx,
            handle,
        }
    }

    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        self.shutdown_tx.send_replace(true);

        if let Err(e) = self.handle.await {
            log_error!(task = self.name, error = %e, "Process loop did not exit cleanly");
        }
    }
}
