// src/modules/valve_control/manager/tick.rs

use chrono::{DateTime, Utc};

use crate::modules::valve_control::{ControllerState, ValveController};
use crate::{log_debug, log_error, log_info, log_warn};

use super::{resolve_target, ManagerCore, TickOutcome, ValveManager};

impl ManagerCore {
    /// One pass: sync, resolve, update, notify. Every controller votes
    /// against the same `now`.
    pub(super) fn run_tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let mut controllers = self.lock_controllers();

        let mut synced = true;
        for controller in controllers.iter_mut() {
            if let Err(e) = controller.sync_with_store() {
                if e.is_connection_error() {
                    log_error!(controller = controller.name(), error = %e, "Store unreachable during sync");
                } else {
                    log_warn!(controller = controller.name(), error = %e, "Controller failed to sync with store");
                }
                synced = false;
            }
        }

        if !synced {
            notify(&mut controllers, None);
            log_warn!("Valve update aborted, controller state unavailable");
            return TickOutcome::Aborted;
        }

        let states: Vec<ControllerState> = controllers.iter().map(|c| c.current_state(now)).collect();

        let Some(winner) = resolve_target(&states, now) else {
            notify(&mut controllers, None);
            log_debug!("No controller has a current vote, valve left alone");
            return TickOutcome::NoTarget;
        };

        let current = self.switch.current_level();
        if winner.state == current {
            notify(&mut controllers, Some(&winner));
            log_debug!(valve = %current, "Valve already matches target");
            return TickOutcome::Unchanged(current);
        }

        match self.switch.update(winner.state) {
            Ok(level) => {
                notify(&mut controllers, Some(&winner));
                log_info!(valve = %level, forced = winner.forced, "💧 Valve moved to target");
                TickOutcome::Updated(level)
            }
            Err(e) => {
                notify(&mut controllers, None);
                log_error!(wanted = %winner.state, error = %e, "Failed to update valve");
                TickOutcome::UpdateFailed(winner.state)
            }
        }
    }
}

fn notify(controllers: &mut [Box<dyn ValveController>], outcome: Option<&ControllerState>) {
    for controller in controllers.iter_mut() {
        controller.on_switch_updated(outcome);
    }
}

impl ValveManager {
    /// Run a single tick against the wall clock.
    pub fn tick(&self) -> TickOutcome {
        self.core.run_tick(Utc::now())
    }

    /// Run a single tick, treating `now` as the current time.
    pub fn tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        self.core.run_tick(now)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Local, NaiveTime};
    use rusqlite::types::Value;

    use super::*;
    use crate::modules::component::ComponentDatabase;
    use crate::modules::valve_control::manager::mock::MockController;
    use crate::modules::valve_control::{
        RemoteJobController, TimerController, ValveDatabase, ValveLevel, ValveSwitch,
    };
    use crate::util::database::Database;
    use crate::util::io::pins::{DummyPins, PinLevel};

    const VALVE_PIN: u8 = 40;

    fn setup() -> (Database, DummyPins, ValveManager) {
        let db = Database::open_in_memory().unwrap();
        db.init_all_schemas().unwrap();
        db.with_transaction(|tx| Ok(tx.provision_product(1)?)).unwrap();

        let pins = DummyPins::new();
        let switch = ValveSwitch::new(db.clone(), Arc::new(pins.clone()), VALVE_PIN, 1).unwrap();
        let manager = ValveManager::new(switch, StdDuration::from_secs(10));
        (db, pins, manager)
    }

    fn local_today(hour: u32) -> DateTime<Utc> {
        Local::now()
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap())
            .and_local_timezone(Local)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_abort_on_sync_failure() {
        let (_db, pins, manager) = setup();
        let now = Utc::now();
        let (open, open_seen) = MockController::new(
            "open",
            ControllerState::new(ValveLevel::Open, now - Duration::minutes(1), true),
        );
        let (broken, broken_seen) = MockController::failing("broken");
        manager.register_controller(Box::new(open));
        manager.register_controller(Box::new(broken));

        assert_eq!(manager.tick_at(now), TickOutcome::Aborted);
        assert_eq!(manager.switch().current_level(), ValveLevel::Closed);
        assert_eq!(pins.level(VALVE_PIN), Some(PinLevel::Low));
        assert_eq!(open_seen.lock().unwrap().notifications, vec![None]);
        assert_eq!(broken_seen.lock().unwrap().notifications, vec![None]);
    }

    #[test]
    fn test_forced_override() {
        let (_db, _pins, manager) = setup();
        manager.switch().open().unwrap();

        let now = Utc::now();
        let timer_vote = ControllerState::new(ValveLevel::Open, now - Duration::minutes(10), false);
        let remote_vote = ControllerState::new(ValveLevel::Closed, now - Duration::minutes(5), true);
        let (timer, timer_seen) = MockController::new("timer", timer_vote);
        let (remote, remote_seen) = MockController::new("remote", remote_vote);
        manager.register_controller(Box::new(timer));
        manager.register_controller(Box::new(remote));

        assert_eq!(manager.tick_at(now), TickOutcome::Updated(ValveLevel::Closed));
        assert_eq!(manager.switch().current_level(), ValveLevel::Closed);
        assert_eq!(timer_seen.lock().unwrap().notifications, vec![Some(remote_vote)]);
        assert_eq!(remote_seen.lock().unwrap().notifications, vec![Some(remote_vote)]);
    }

    #[test]
    fn test_recency_without_force() {
        let (_db, pins, manager) = setup();
        let now = Utc::now();
        let (newer, _) = MockController::new(
            "newer",
            ControllerState::new(ValveLevel::Open, now - Duration::minutes(5), false),
        );
        let (older, _) = MockController::new(
            "older",
            ControllerState::new(ValveLevel::Closed, now - Duration::minutes(10), false),
        );
        manager.register_controller(Box::new(older));
        manager.register_controller(Box::new(newer));

        assert_eq!(manager.tick_at(now), TickOutcome::Updated(ValveLevel::Open));
        assert_eq!(pins.level(VALVE_PIN), Some(PinLevel::High));
    }

    #[test]
    fn test_only_future_votes_means_no_update() {
        let (_db, pins, manager) = setup();
        let now = Utc::now();
        let (future, seen) = MockController::new(
            "future",
            ControllerState::new(ValveLevel::Open, now + Duration::minutes(1), true),
        );
        manager.register_controller(Box::new(future));
        let writes = pins.write_count();

        assert_eq!(manager.tick_at(now), TickOutcome::NoTarget);
        assert_eq!(pins.write_count(), writes);
        assert_eq!(seen.lock().unwrap().notifications, vec![None]);
    }

    #[test]
    fn test_matching_target_is_successful_noop() {
        let (_db, pins, manager) = setup();
        let now = Utc::now();
        let vote = ControllerState::new(ValveLevel::Closed, now, true);
        let (remote, seen) = MockController::new("remote", vote);
        manager.register_controller(Box::new(remote));
        let writes = pins.write_count();

        assert_eq!(manager.tick_at(now), TickOutcome::Unchanged(ValveLevel::Closed));
        assert_eq!(pins.write_count(), writes);
        assert_eq!(seen.lock().unwrap().notifications, vec![Some(vote)]);
    }

    #[test]
    fn test_failed_update_notifies_none() {
        let (_db, pins, manager) = setup();
        let now = Utc::now();
        let (remote, seen) = MockController::new(
            "remote",
            ControllerState::new(ValveLevel::Open, now, true),
        );
        manager.register_controller(Box::new(remote));
        pins.fail_writes(true);

        assert_eq!(manager.tick_at(now), TickOutcome::UpdateFailed(ValveLevel::Open));
        assert_eq!(manager.switch().current_level(), ValveLevel::Closed);
        assert_eq!(seen.lock().unwrap().notifications, vec![None]);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let (_db, _pins, manager) = setup();
        let (first, first_seen) = MockController::new("remote", ControllerState::inert());
        let (second, second_seen) = MockController::new("remote", ControllerState::inert());
        manager.register_controller(Box::new(first));
        manager.register_controller(Box::new(second));

        assert_eq!(manager.controller_names(), vec!["remote".to_string()]);
        manager.tick();
        assert_eq!(first_seen.lock().unwrap().syncs, 0);
        assert_eq!(second_seen.lock().unwrap().syncs, 1);
    }

    #[test]
    fn test_remote_job_drives_valve_and_completes() {
        let (db, pins, manager) = setup();
        let remote = RemoteJobController::new(db.clone(), 1).unwrap();
        let remote_component = remote.component_id();
        manager.register_controller(Box::new(remote));
        manager.register_controller(Box::new(TimerController::new(db.clone(), 1).unwrap()));

        let job_id = db
            .with_transaction(|tx| Ok(tx.insert_remote_job(remote_component, 1)?))
            .unwrap();

        assert_eq!(manager.tick(), TickOutcome::Updated(ValveLevel::Open));
        assert_eq!(pins.level(VALVE_PIN), Some(PinLevel::High));

        let completion: Value = db
            .with_transaction(|tx| {
                Ok(tx.query_row(
                    "SELECT completion_status FROM valve_remote_switch_job WHERE id = ?1",
                    [job_id],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(completion, Value::Integer(1));

        // The forced job keeps holding the valve open on later ticks
        assert_eq!(manager.tick(), TickOutcome::Unchanged(ValveLevel::Open));
    }

    #[test]
    fn test_tick_at_drives_timer_with_given_clock() {
        let (db, pins, manager) = setup();
        let timer = TimerController::new(db.clone(), 1).unwrap();
        let timer_component = timer.component_id();
        manager.register_controller(Box::new(timer));
        db.with_transaction(|tx| {
            Ok(tx.insert_timer_config(timer_component, true, Some("11:00:00"), Some("13:00:00"))?)
        })
        .unwrap();

        assert_eq!(manager.tick_at(local_today(12)), TickOutcome::Updated(ValveLevel::Open));
        assert_eq!(pins.level(VALVE_PIN), Some(PinLevel::High));

        assert_eq!(manager.tick_at(local_today(13)), TickOutcome::Unchanged(ValveLevel::Open));
        assert_eq!(manager.tick_at(local_today(14)), TickOutcome::Updated(ValveLevel::Closed));
        assert_eq!(pins.level(VALVE_PIN), Some(PinLevel::Low));

        // Before the window opens the timer still votes, so the valve stays shut
        assert_eq!(manager.tick_at(local_today(6)), TickOutcome::Unchanged(ValveLevel::Closed));
    }
}
