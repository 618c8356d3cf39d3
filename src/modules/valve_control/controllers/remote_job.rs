// src/modules/valve_control/controllers/remote_job.rs
//! Turns the latest row of `valve_remote_switch_job` into a forced vote and
//! answers the job once the manager has acted on it.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::error::{Result, SprinklerError};
use crate::modules::component::{resolve_component, ComponentKind};
use crate::modules::valve_control::database::RemoteJobRow;
use crate::modules::valve_control::{ControllerState, ValveController, ValveDatabase, ValveLevel};
use crate::util::database::Database;
use crate::{log_debug, log_info, log_warn};

use super::created_timestamp;

pub const REMOTE_CONTROLLER_NAME: &str = "remote-switch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCompletion {
    Failed,
    Succeeded,
}

impl JobCompletion {
    pub fn as_i64(&self) -> i64 {
        match self {
            JobCompletion::Failed => 0,
            JobCompletion::Succeeded => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteJob {
    pub id: i64,
    pub state: ValveLevel,
    pub completion: Option<JobCompletion>,
    pub created: DateTime<Utc>,
}

impl RemoteJob {
    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }
}

impl TryFrom<RemoteJobRow> for RemoteJob {
    type Error = SprinklerError;

    fn try_from(row: RemoteJobRow) -> Result<Self> {
        let id = match row.id {
            Value::Integer(id) => id,
            other => {
                return Err(SprinklerError::MalformedRecord(format!(
                    "remote switch job has no usable id: {:?}",
                    other
                )))
            }
        };

        let state = match row.state {
            Value::Integer(raw) => ValveLevel::try_from(raw).map_err(|_| {
                SprinklerError::MalformedRecord(format!("remote switch job {} has state {}", id, raw))
            })?,
            other => {
                return Err(SprinklerError::MalformedRecord(format!(
                    "remote switch job {} has state {:?}",
                    id, other
                )))
            }
        };

        let completion = match row.completion_status {
            Value::Null => None,
            Value::Integer(0) => Some(JobCompletion::Failed),
            Value::Integer(1) => Some(JobCompletion::Succeeded),
            other => {
                return Err(SprinklerError::MalformedRecord(format!(
                    "remote switch job {} has completion status {:?}",
                    id, other
                )))
            }
        };

        let created = created_timestamp("valve_remote_switch_job", &row.created)?;

        Ok(RemoteJob {
            id,
            state,
            completion,
            created,
        })
    }
}

#[derive(Debug)]
pub struct RemoteJobController {
    db: Database,
    component_id: i64,
    job: Option<RemoteJob>,
}

impl RemoteJobController {
    pub fn new(db: Database, product_id: i64) -> Result<Self> {
        let component_id = resolve_component(&db, product_id, ComponentKind::RemoteSwitch)?;
        Ok(Self {
            db,
            component_id,
            job: None,
        })
    }

    pub fn component_id(&self) -> i64 {
        self.component_id
    }

    pub fn job(&self) -> Option<&RemoteJob> {
        self.job.as_ref()
    }
}

impl ValveController for RemoteJobController {
    fn name(&self) -> &str {
        REMOTE_CONTROLLER_NAME
    }

    fn sync_with_store(&mut self) -> Result<()> {
        let component_id = self.component_id;
        let row = self
            .db
            .with_transaction(|tx| Ok(tx.latest_remote_job(component_id)?))?;

        self.job = match row {
            Some(row) => Some(RemoteJob::try_from(row)?),
            None => None,
        };
        Ok(())
    }

    fn current_state(&self, _now: DateTime<Utc>) -> ControllerState {
        match &self.job {
            Some(job) => ControllerState::new(job.state, job.created, true),
            None => ControllerState::inert(),
        }
    }

    fn on_switch_updated(&mut self, outcome: Option<&ControllerState>) {
        let Some(outcome) = outcome else {
            return;
        };
        let Some(job) = self.job.as_mut() else {
            return;
        };
        if job.is_complete() {
            return;
        }

        let completion = if outcome.state == job.state {
            JobCompletion::Succeeded
        } else {
            JobCompletion::Failed
        };

        let job_id = job.id;
        match self
            .db
            .with_transaction(|tx| Ok(tx.record_job_completion(job_id, completion.as_i64())?))
        {
            Ok(0) => {
                log_debug!(job_id, "Remote switch job was already answered");
                job.completion = Some(completion);
            }
            Ok(_) => {
                log_info!(job_id, ?completion, "Remote switch job completed");
                job.completion = Some(completion);
            }
            Err(e) => {
                // Left pending, the next tick writes it again
                log_warn!(job_id, error = %e, "Failed to record remote switch job completion");
            }
        }
    }
}
