// src/modules/valve_control/controllers/timer.rs
//! Daily watering window read from `valve_timer`. The vote is OPEN while the
//! local time of day sits inside `[start, end]`, CLOSED otherwise.

use chrono::{DateTime, Local, NaiveTime, Utc};
use rusqlite::types::Value;

use crate::error::{Result, SprinklerError};
use crate::modules::component::{resolve_component, ComponentKind};
use crate::modules::valve_control::database::TimerRow;
use crate::modules::valve_control::{ControllerState, ValveController, ValveDatabase, ValveLevel};
use crate::util::database::Database;
use crate::log_debug;

use super::created_timestamp;

pub const TIMER_CONTROLLER_NAME: &str = "timer";

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSchedule {
    Disabled,
    Window { start: NaiveTime, end: NaiveTime },
}

impl TimerSchedule {
    pub fn is_open_at(&self, time_of_day: NaiveTime) -> bool {
        match self {
            TimerSchedule::Disabled => false,
            TimerSchedule::Window { start, end } => *start <= time_of_day && time_of_day <= *end,
        }
    }
}

impl TryFrom<TimerRow> for TimerSchedule {
    type Error = SprinklerError;

    fn try_from(row: TimerRow) -> Result<Self> {
        created_timestamp("valve_timer", &row.created)?;

        match row.enabled {
            Value::Integer(0) => Ok(TimerSchedule::Disabled),
            Value::Integer(1) => {
                let start = time_of_day(row.id, "start_time", &row.start_time)?;
                let end = time_of_day(row.id, "end_time", &row.end_time)?;
                if start > end {
                    return Err(SprinklerError::MalformedRecord(format!(
                        "valve_timer {} starts at {} after it ends at {}",
                        row.id, start, end
                    )));
                }
                Ok(TimerSchedule::Window { start, end })
            }
            other => Err(SprinklerError::MalformedRecord(format!(
                "valve_timer {} has enabled = {:?}",
                row.id, other
            ))),
        }
    }
}

/// Times are stored either as seconds since midnight or as `HH:MM[:SS]` text.
fn time_of_day(row_id: i64, column: &str, value: &Value) -> Result<NaiveTime> {
    let parsed = match value {
        Value::Integer(secs) if (0..SECONDS_PER_DAY).contains(secs) => {
            NaiveTime::from_num_seconds_from_midnight_opt(*secs as u32, 0)
        }
        Value::Text(text) => NaiveTime::parse_from_str(text, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .ok(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        SprinklerError::MalformedRecord(format!(
            "valve_timer {} has an unusable {}: {:?}",
            row_id, column, value
        ))
    })
}

#[derive(Debug)]
pub struct TimerController {
    db: Database,
    component_id: i64,
    schedule: TimerSchedule,
}

impl TimerController {
    pub fn new(db: Database, product_id: i64) -> Result<Self> {
        let component_id = resolve_component(&db, product_id, ComponentKind::Timer)?;
        Ok(Self {
            db,
            component_id,
            schedule: TimerSchedule::Disabled,
        })
    }

    pub fn component_id(&self) -> i64 {
        self.component_id
    }

    pub fn schedule(&self) -> TimerSchedule {
        self.schedule
    }

    /// Vote for an explicit local time of day, stamped with `now`.
    pub fn state_at(&self, time_of_day: NaiveTime, now: DateTime<Utc>) -> ControllerState {
        let state = if self.schedule.is_open_at(time_of_day) {
            ValveLevel::Open
        } else {
            ValveLevel::Closed
        };
        ControllerState::new(state, now, false)
    }
}

impl ValveController for TimerController {
    fn name(&self) -> &str {
        TIMER_CONTROLLER_NAME
    }

    fn sync_with_store(&mut self) -> Result<()> {
        let component_id = self.component_id;
        let row = self
            .db
            .with_transaction(|tx| Ok(tx.latest_timer_config(component_id)?))?;

        let schedule = match row {
            Some(row) => TimerSchedule::try_from(row)?,
            None => TimerSchedule::Disabled,
        };

        if schedule != self.schedule {
            log_debug!(?schedule, "Timer schedule changed");
        }
        self.schedule = schedule;
        Ok(())
    }

    fn current_state(&self, now: DateTime<Utc>) -> ControllerState {
        self.state_at(now.with_timezone(&Local).time(), now)
    }

    fn on_switch_updated(&mut self, _outcome: Option<&ControllerState>) {}
}
