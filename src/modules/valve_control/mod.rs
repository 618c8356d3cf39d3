// src/modules/valve_control/mod.rs

pub mod controllers;
pub mod database;
pub mod manager;
pub mod switch;

pub use controllers::{RemoteJobController, TimerController};
pub use database::ValveDatabase;
pub use manager::{TickOutcome, ValveManager};
pub use switch::ValveSwitch;

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{Result, SprinklerError};
use crate::util::io::pins::PinLevel;

/// Valve position as stored in the database: 0 = closed, 1 = open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValveLevel {
    Closed,
    Open,
}

impl ValveLevel {
    pub fn as_i64(&self) -> i64 {
        match self {
            ValveLevel::Closed => 0,
            ValveLevel::Open => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValveLevel::Closed => "closed",
            ValveLevel::Open => "open",
        }
    }

    pub fn pin_level(&self) -> PinLevel {
        match self {
            ValveLevel::Closed => PinLevel::Low,
            ValveLevel::Open => PinLevel::High,
        }
    }
}

impl fmt::Display for ValveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for ValveLevel {
    type Error = SprinklerError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(ValveLevel::Closed),
            1 => Ok(ValveLevel::Open),
            other => Err(SprinklerError::InvalidTarget(format!("{} is not a valve level", other))),
        }
    }
}

/// One controller's vote, derived from its cached record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    pub state: ValveLevel,
    /// When this vote became authoritative.
    pub due_by: DateTime<Utc>,
    /// Forced votes are not outranked by anything older.
    pub forced: bool,
}

impl ControllerState {
    pub fn new(state: ValveLevel, due_by: DateTime<Utc>, forced: bool) -> Self {
        Self { state, due_by, forced }
    }

    /// The vote of a controller that has nothing to say.
    pub fn inert() -> Self {
        Self::new(ValveLevel::Closed, DateTime::<Utc>::default(), false)
    }
}

/// A source of valve intent, polled once per manager tick.
pub trait ValveController: Send {
    /// Registration key; unique per manager.
    fn name(&self) -> &str;

    /// Refresh the cache from the store. On error the cache is left as it was.
    fn sync_with_store(&mut self) -> Result<()>;

    /// Pure function of the cache and the tick's clock; never touches the store.
    fn current_state(&self, now: DateTime<Utc>) -> ControllerState;

    /// Called once per tick. `None` means no update happened. Must be idempotent.
    fn on_switch_updated(&mut self, outcome: Option<&ControllerState>);
}
