// src/modules/valve_control/manager/lifecycle.rs

use crate::util::task::PeriodicTask;
use crate::{log_info, log_warn};

use super::ValveManager;

impl ValveManager {
    /// Spawn the tick loop. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        if self.task.is_some() {
            log_warn!("Valve manager is already running");
            return;
        }

        let core = self.core.clone();
        self.task = Some(PeriodicTask::spawn("valve-manager", self.interval, move || {
            core.run_tick(chrono::Utc::now());
        }));

        log_info!(interval_secs = self.interval.as_secs(), "Valve manager started");
    }

    /// Signal the loop and wait until the current tick, if any, has finished.
    pub async fn stop(&mut self) {
        match self.task.take() {
            Some(task) => {
                task.stop().await;
                log_info!("Valve manager stopped");
            }
            None => log_warn!("Valve manager is not running"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}
