// src/modules/valve_control/controllers/mod.rs

pub mod remote_job;
pub mod timer;

pub use remote_job::{JobCompletion, RemoteJob, RemoteJobController};
pub use timer::{TimerController, TimerSchedule};

use rusqlite::types::Value;

use crate::error::{Result, SprinklerError};
use crate::util::database::parse_sql_timestamp;
use chrono::{DateTime, Utc};

/// Shared by the controllers: a `created` column must be a readable timestamp.
pub(crate) fn created_timestamp(table: &str, value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::Text(text) => parse_sql_timestamp(text).ok_or_else(|| {
            SprinklerError::MalformedRecord(format!("{}.created is not a timestamp: {}", table, text))
        }),
        other => Err(SprinklerError::MalformedRecord(format!(
            "{}.created has unexpected type: {:?}",
            table, other
        ))),
    }
}
