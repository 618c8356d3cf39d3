// src/util/io/pins.rs
//! Pin abstraction for the board header. The runtime only needs three
//! operations: drive an output, read edges on an input, and release everything.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, SprinklerError};
use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinLevel {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    fn matches(&self, observed: Edge) -> bool {
        *self == Edge::Both || *self == observed
    }
}

pub type EdgeCallback = Box<dyn Fn(u8) + Send + Sync>;

pub trait PinDriver: Send + Sync + std::fmt::Debug {
    fn configure_output(&self, pin: u8) -> Result<()>;

    fn set_level(&self, pin: u8, level: PinLevel) -> Result<()>;

    /// Register `callback` to run on every matching edge seen on `pin`.
    fn configure_input(&self, pin: u8, edge: Edge, callback: EdgeCallback) -> Result<()>;

    fn cleanup(&self) -> Result<()>;
}

#[derive(Default)]
struct DummyState {
    outputs: HashMap<u8, PinLevel>,
    inputs: HashMap<u8, (Edge, Arc<dyn Fn(u8) + Send + Sync>)>,
    fail_writes: bool,
    writes: usize,
}

/// In-memory driver used on hosts without a GPIO header and in tests.
/// Clones share state, so a test can keep a handle while the switch owns another.
#[derive(Clone, Default)]
pub struct DummyPins {
    state: Arc<Mutex<DummyState>>,
}

impl std::fmt::Debug for DummyPins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("DummyPins")
            .field("outputs", &state.outputs)
            .field("inputs", &state.inputs.keys().collect::<Vec<_>>())
            .field("fail_writes", &state.fail_writes)
            .finish()
    }
}

impl DummyPins {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DummyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current level of an output pin, `None` if it was never configured.
    pub fn level(&self, pin: u8) -> Option<PinLevel> {
        self.lock().outputs.get(&pin).copied()
    }

    /// Make every following `set_level` call fail until turned off again.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful `set_level` calls so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Simulate an edge on an input pin. Returns whether a callback ran.
    pub fn trigger(&self, pin: u8, edge: Edge) -> bool {
        let callback = match self.lock().inputs.get(&pin) {
            Some((wanted, callback)) if wanted.matches(edge) => callback.clone(),
            _ => return false,
        };
        // Run outside the lock so the callback may touch the driver.
        callback(pin);
        true
    }
}

impl PinDriver for DummyPins {
    fn configure_output(&self, pin: u8) -> Result<()> {
        log_debug!(pin, "Configured output pin");
        self.lock().outputs.entry(pin).or_insert(PinLevel::Low);
        Ok(())
    }

    fn set_level(&self, pin: u8, level: PinLevel) -> Result<()> {
        let mut state = self.lock();

        if state.fail_writes {
            return Err(SprinklerError::HardwareWriteFailure {
                pin,
                reason: "write rejected by driver".to_string(),
            });
        }

        match state.outputs.get_mut(&pin) {
            Some(current) => {
                *current = level;
                state.writes += 1;
                Ok(())
            }
            None => Err(SprinklerError::HardwareWriteFailure {
                pin,
                reason: "pin is not configured as an output".to_string(),
            }),
        }
    }

    fn configure_input(&self, pin: u8, edge: Edge, callback: EdgeCallback) -> Result<()> {
        log_debug!(pin, ?edge, "Configured input pin");
        self.lock().inputs.insert(pin, (edge, Arc::from(callback)));
        Ok(())
    }

    fn cleanup(&self) -> Result<()> {
        let mut state = self.lock();
        state.outputs.clear();
        state.inputs.clear();
        Ok(())
    }
}
