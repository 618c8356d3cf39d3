// src/modules/valve_control/manager/resolve.rs

use chrono::{DateTime, Utc};

use crate::modules::valve_control::{ControllerState, ValveLevel};

/// Pick the winning vote among `states` as of `now`.
///
/// Votes due after `now` are ignored. The rest are walked from most recent to
/// oldest; a forced winner is final, otherwise an older vote takes over when
/// it is forced or when it asks to open a valve the winner would close.
pub fn resolve_target(states: &[ControllerState], now: DateTime<Utc>) -> Option<ControllerState> {
    let mut candidates: Vec<ControllerState> = states
        .iter()
        .filter(|state| state.due_by <= now)
        .copied()
        .collect();

    // Stable: equal due_by keeps registration order
    candidates.sort_by(|a, b| b.due_by.cmp(&a.due_by));

    let mut candidates = candidates.into_iter();
    let first = candidates.next()?;

    Some(candidates.fold(first, |winner, next| {
        if outranks(&next, &winner) {
            next
        } else {
            winner
        }
    }))
}

fn outranks(next: &ControllerState, winner: &ControllerState) -> bool {
    if winner.forced {
        return false;
    }
    next.forced || (next.state == ValveLevel::Open && winner.state == ValveLevel::Closed)
}
