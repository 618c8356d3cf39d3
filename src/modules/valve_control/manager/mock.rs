// src/modules/valve_control/manager/mock.rs

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::error::{Result, SprinklerError};
use crate::modules::valve_control::{ControllerState, ValveController};

/// What a mock controller saw, shared with the test that built it.
#[derive(Debug, Default)]
pub struct Seen {
    pub syncs: usize,
    pub notifications: Vec<Option<ControllerState>>,
}

pub struct MockController {
    name: &'static str,
    state: ControllerState,
    fail_sync: bool,
    seen: Arc<Mutex<Seen>>,
}

impl MockController {
    pub fn new(name: &'static str, state: ControllerState) -> (Self, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let controller = Self {
            name,
            state,
            fail_sync: false,
            seen: seen.clone(),
        };
        (controller, seen)
    }

    pub fn failing(name: &'static str) -> (Self, Arc<Mutex<Seen>>) {
        let (mut controller, seen) = Self::new(name, ControllerState::inert());
        controller.fail_sync = true;
        (controller, seen)
    }
}

impl ValveController for MockController {
    fn name(&self) -> &str {
        self.name
    }

    fn sync_with_store(&mut self) -> Result<()> {
        self.seen.lock().unwrap().syncs += 1;
        if self.fail_sync {
            return Err(SprinklerError::MalformedRecord("mock sync failure".to_string()));
        }
        Ok(())
    }

    fn current_state(&self, _now: DateTime<Utc>) -> ControllerState {
        self.state
    }

    fn on_switch_updated(&mut self, outcome: Option<&ControllerState>) {
        self.seen.lock().unwrap().notifications.push(outcome.copied());
    }
}
