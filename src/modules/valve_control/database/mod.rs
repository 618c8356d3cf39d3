// src/modules/valve_control/database/mod.rs
// Append-only valve tables: state log, remote switch jobs, timer configs

mod init_schema;
mod remote_switch_job;
mod valve_state;
mod valve_timer;

use rusqlite::types::Value;
use rusqlite::{Connection, Result};

/// Latest `valve_state` row, unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct ValveStateRow {
    pub id: i64,
    pub state: Value,
    pub created: Value,
}

/// Latest `valve_remote_switch_job` row, unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteJobRow {
    pub id: Value,
    pub state: Value,
    pub completion_status: Value,
    pub created: Value,
}

/// Latest `valve_timer` row, unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRow {
    pub id: i64,
    pub enabled: Value,
    pub start_time: Value,
    pub end_time: Value,
    pub created: Value,
}

/// Trait to add valve-specific operations to a connection (or a transaction, through deref).
///
/// Rows come back as raw SQLite values; the switch and the controllers decide
/// what counts as malformed.
pub trait ValveDatabase {
    fn init_valve_schema(&self) -> Result<()>;

    // Valve state log
    fn latest_valve_state(&self, component_id: i64) -> Result<Option<ValveStateRow>>;
    fn insert_valve_state(&self, component_id: i64, state: i64) -> Result<i64>;

    // Remote switch jobs
    fn latest_remote_job(&self, component_id: i64) -> Result<Option<RemoteJobRow>>;
    fn insert_remote_job(&self, component_id: i64, state: i64) -> Result<i64>;
    fn record_job_completion(&self, job_id: i64, completion_status: i64) -> Result<usize>;

    // Timer configs
    fn latest_timer_config(&self, component_id: i64) -> Result<Option<TimerRow>>;
    fn insert_timer_config(
        &self,
        component_id: i64,
        enabled: bool,
        start_time: Option<&str>,
        end_time: Option<&str>,
    ) -> Result<i64>;
}

impl ValveDatabase for Connection {
    fn init_valve_schema(&self) -> Result<()> {
        init_schema::init_valve_schema(self)
    }

    fn latest_valve_state(&self, component_id: i64) -> Result<Option<ValveStateRow>> {
        valve_state::latest_valve_state(self, component_id)
    }

    fn insert_valve_state(&self, component_id: i64, state: i64) -> Result<i64> {
        valve_state::insert_valve_state(self, component_id, state)
    }

    fn latest_remote_job(&self, component_id: i64) -> Result<Option<RemoteJobRow>> {
        remote_switch_job::latest_remote_job(self, component_id)
    }

    fn insert_remote_job(&self, component_id: i64, state: i64) -> Result<i64> {
        remote_switch_job::insert_remote_job(self, component_id, state)
    }

    fn record_job_completion(&self, job_id: i64, completion_status: i64) -> Result<usize> {
        remote_switch_job::record_job_completion(self, job_id, completion_status)
    }

    fn latest_timer_config(&self, component_id: i64) -> Result<Option<TimerRow>> {
        valve_timer::latest_timer_config(self, component_id)
    }

    fn insert_timer_config(
        &self,
        component_id: i64,
        enabled: bool,
        start_time: Option<&str>,
        end_time: Option<&str>,
    ) -> Result<i64> {
        valve_timer::insert_timer_config(self, component_id, enabled, start_time, end_time)
    }
}
