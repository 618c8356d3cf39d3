// src/modules/valve_control/switch.rs
//! The only code allowed to move the valve pin. Every change is written to the
//! pin first and then to `valve_state`; if the write fails the pin goes back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::types::Value;

use crate::error::{Result, SprinklerError};
use crate::modules::component::{resolve_component, ComponentKind};
use crate::util::database::Database;
use crate::util::io::pins::PinDriver;
use crate::{log_debug, log_error, log_info, log_warn};

use super::{ValveDatabase, ValveLevel};

#[derive(Debug)]
struct SwitchState {
    level: ValveLevel,
    persisted: Option<ValveLevel>,
}

#[derive(Debug)]
pub struct ValveSwitch {
    db: Database,
    pins: Arc<dyn PinDriver>,
    pin: u8,
    component_id: i64,
    state: Mutex<SwitchState>,
}

impl ValveSwitch {
    /// Resolve the valve component and drive the pin closed.
    pub fn new(db: Database, pins: Arc<dyn PinDriver>, pin: u8, product_id: i64) -> Result<Self> {
        let component_id = resolve_component(&db, product_id, ComponentKind::Valve)?;

        pins.configure_output(pin)?;
        pins.set_level(pin, ValveLevel::Closed.pin_level())?;

        log_debug!(pin, component_id, "Valve has been configured");

        Ok(Self {
            db,
            pins,
            pin,
            component_id,
            state: Mutex::new(SwitchState {
                level: ValveLevel::Closed,
                persisted: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SwitchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn component_id(&self) -> i64 {
        self.component_id
    }

    pub fn current_level(&self) -> ValveLevel {
        self.lock().level
    }

    /// Level of the last record this switch read or wrote, if any.
    pub fn persisted_level(&self) -> Option<ValveLevel> {
        self.lock().persisted
    }

    /// Bring the pin in line with the most recent `valve_state` row.
    pub fn sync_from_store(&self) -> Result<ValveLevel> {
        let mut state = self.lock();
        let component_id = self.component_id;

        let row = self
            .db
            .with_transaction(|tx| Ok(tx.latest_valve_state(component_id)?))?
            .ok_or_else(|| SprinklerError::MalformedRecord("no valve state recorded yet".to_string()))?;

        let level = match row.state {
            Value::Integer(raw) => ValveLevel::try_from(raw).map_err(|_| {
                SprinklerError::MalformedRecord(format!("valve_state {} has state {}", row.id, raw))
            })?,
            other => {
                return Err(SprinklerError::MalformedRecord(format!(
                    "valve_state {} has non-integer state {:?}",
                    row.id, other
                )))
            }
        };

        self.write_pin(level)?;
        state.level = level;
        state.persisted = Some(level);

        log_info!(valve = %level, "Valve synced from store");
        Ok(level)
    }

    /// Move the valve. Fails with `InvalidTarget` when it is already there.
    pub fn update(&self, target: ValveLevel) -> Result<ValveLevel> {
        let mut state = self.lock();
        let prior = state.level;

        if target == prior {
            log_debug!(valve = %target, "Valve state is already {}", target);
            return Err(SprinklerError::InvalidTarget(format!("valve is already {}", target)));
        }

        self.write_pin(target)?;

        let component_id = self.component_id;
        match self
            .db
            .with_transaction(|tx| Ok(tx.insert_valve_state(component_id, target.as_i64())?))
        {
            Ok(record_id) => {
                state.level = target;
                state.persisted = Some(target);
                log_info!(valve = %target, record_id, "Valve state updated successfully");
                Ok(target)
            }
            Err(e) => {
                log_warn!(error = %e, "Valve state could not be saved, reverting pin to {}", prior);
                if let Err(revert_err) = self.write_pin(prior) {
                    log_error!(
                        error = %revert_err,
                        "Failed to revert valve pin. Pin and store might be in inconsistent states"
                    );
                }
                Err(e)
            }
        }
    }

    pub fn open(&self) -> Result<ValveLevel> {
        self.update(ValveLevel::Open)
    }

    pub fn close(&self) -> Result<ValveLevel> {
        self.update(ValveLevel::Closed)
    }

    /// Raw integer entry point for callers holding an unchecked level.
    pub fn update_raw(&self, raw: i64) -> Result<ValveLevel> {
        let target = ValveLevel::try_from(raw)?;
        self.update(target)
    }

    fn write_pin(&self, level: ValveLevel) -> Result<()> {
        self.pins
            .set_level(self.pin, level.pin_level())
            .map_err(|e| match e {
                hardware @ SprinklerError::HardwareWriteFailure { .. } => hardware,
                other => SprinklerError::HardwareWriteFailure {
                    pin: self.pin,
                    reason: other.to_string(),
                },
            })
    }
}
