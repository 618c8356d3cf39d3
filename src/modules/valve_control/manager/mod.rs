// src/modules/valve_control/manager/mod.rs
//! Consensus engine: polls every registered controller, resolves a single
//! target and drives the switch toward it.

mod lifecycle;
mod resolve;
mod tick;

#[cfg(test)]
mod mock;

pub use resolve::resolve_target;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::log_info;
use crate::util::task::PeriodicTask;

use super::{ValveController, ValveLevel, ValveSwitch};

/// What one tick did. Logged after every tick and returned to direct callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A controller failed to sync; nothing was resolved.
    Aborted,
    /// No controller had a current vote.
    NoTarget,
    /// The switch already matched the winner.
    Unchanged(ValveLevel),
    Updated(ValveLevel),
    UpdateFailed(ValveLevel),
}

struct ManagerCore {
    switch: ValveSwitch,
    controllers: Mutex<Vec<Box<dyn ValveController>>>,
}

impl ManagerCore {
    fn lock_controllers(&self) -> MutexGuard<'_, Vec<Box<dyn ValveController>>> {
        self.controllers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ValveManager {
    core: Arc<ManagerCore>,
    interval: Duration,
    task: Option<PeriodicTask>,
}

impl std::fmt::Debug for ValveManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValveManager")
            .field("switch", &self.core.switch)
            .field("controllers", &self.controller_names())
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ValveManager {
    pub fn new(switch: ValveSwitch, interval: Duration) -> Self {
        Self {
            core: Arc::new(ManagerCore {
                switch,
                controllers: Mutex::new(Vec::new()),
            }),
            interval,
            task: None,
        }
    }

    /// Add a controller, replacing any registered under the same name.
    pub fn register_controller(&self, controller: Box<dyn ValveController>) {
        let mut controllers = self.core.lock_controllers();
        let name = controller.name().to_string();

        match controllers.iter().position(|c| c.name() == name) {
            Some(index) => {
                controllers[index] = controller;
                log_info!(controller = %name, "Replaced valve controller");
            }
            None => {
                controllers.push(controller);
                log_info!(controller = %name, "Registered valve controller");
            }
        }
    }

    pub fn controller_names(&self) -> Vec<String> {
        self.core
            .lock_controllers()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn switch(&self) -> &ValveSwitch {
        &self.core.switch
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
