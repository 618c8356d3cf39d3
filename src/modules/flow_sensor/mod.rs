// src/modules/flow_sensor/mod.rs
//! Counts pulses from the flow meter and periodically stores the volume that
//! passed since the last save.

pub mod database;
pub use database::FlowSensorDatabase;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::config::FlowSensorConfig;
use crate::error::Result;
use crate::modules::component::{resolve_component, ComponentKind};
use crate::util::database::Database;
use crate::util::io::pins::{Edge, PinDriver};
use crate::util::task::PeriodicTask;
use crate::{log_debug, log_error, log_info, log_warn};

/// One saved measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowReading {
    /// Litres
    pub volume: f64,
    /// Seconds
    pub duration: f64,
    pub pulses: u64,
}

#[derive(Debug)]
struct FlowCore {
    db: Database,
    component_id: i64,
    config: FlowSensorConfig,
    pulses: Arc<AtomicU64>,
    last_read: Mutex<Instant>,
}

#[derive(Debug)]
pub struct FlowSensor {
    core: Arc<FlowCore>,
    task: Option<PeriodicTask>,
}

impl FlowSensor {
    pub fn new(
        db: Database,
        pins: Arc<dyn PinDriver>,
        pin: u8,
        product_id: i64,
        config: FlowSensorConfig,
    ) -> Result<Self> {
        let component_id = resolve_component(&db, product_id, ComponentKind::FlowSensor)?;

        let pulses = Arc::new(AtomicU64::new(0));
        let counter = pulses.clone();
        pins.configure_input(
            pin,
            Edge::Rising,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        )?;

        log_debug!(pin, component_id, "Flow sensor is up and running");

        Ok(Self {
            core: Arc::new(FlowCore {
                db,
                component_id,
                config,
                pulses,
                last_read: Mutex::new(Instant::now()),
            }),
            task: None,
        })
    }

    pub fn component_id(&self) -> i64 {
        self.core.component_id
    }

    /// Pulses counted since the last successful save.
    pub fn pending_pulses(&self) -> u64 {
        self.core.pulses.load(Ordering::Relaxed)
    }

    pub fn save_flow(&self) -> Result<Option<FlowReading>> {
        self.core.save_flow_at(Instant::now())
    }

    /// Save as if the current time were `now`. Returns `None` when the
    /// reading is below both save thresholds.
    pub fn save_flow_at(&self, now: Instant) -> Result<Option<FlowReading>> {
        self.core.save_flow_at(now)
    }

    pub fn start(&mut self) {
        if self.task.is_some() {
            log_warn!("Flow sensor saver is already running");
            return;
        }

        let core = self.core.clone();
        self.task = Some(PeriodicTask::spawn(
            "flow-sensor",
            self.core.config.save_interval(),
            move || match core.save_flow_at(Instant::now()) {
                Ok(Some(reading)) => log_debug!(?reading, "Save flow process completed"),
                Ok(None) => {}
                Err(e) => log_error!(error = %e, "Failed to save flow data"),
            },
        ));
    }

    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.stop().await;
            log_info!("Flow sensor saver stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl FlowCore {
    fn save_flow_at(&self, now: Instant) -> Result<Option<FlowReading>> {
        let mut last_read = self.last_read.lock().unwrap_or_else(PoisonError::into_inner);

        let pulses = self.pulses.load(Ordering::Relaxed);
        let reading = FlowReading {
            volume: pulses as f64 / self.config.pulses_per_litre,
            duration: now.saturating_duration_since(*last_read).as_secs_f64(),
            pulses,
        };

        if reading.duration < self.config.max_flow_duration_for_save
            && reading.volume < self.config.min_flow_volume_for_save
        {
            log_debug!(
                volume = reading.volume,
                duration = reading.duration,
                "Flow below save thresholds, skipping save"
            );
            return Ok(None);
        }

        let component_id = self.component_id;
        let record_id = self.db.with_transaction(|tx| {
            Ok(tx.insert_flow_rate(component_id, reading.volume, reading.duration)?)
        })?;

        // Pulses that arrived during the insert belong to the next reading
        self.pulses.fetch_sub(pulses, Ordering::Relaxed);
        *last_read = now;

        log_info!(
            record_id,
            volume = reading.volume,
            duration = reading.duration,
            "Flow data saved"
        );
        Ok(Some(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::component::ComponentDatabase;
    use crate::util::io::pins::DummyPins;
    use std::time::Duration;

    const FLOW_PIN: u8 = 38;

    fn setup(config: FlowSensorConfig) -> (Database, DummyPins, FlowSensor) {
        let db = Database::open_in_memory().unwrap();
        db.init_all_schemas().unwrap();
        db.with_transaction(|tx| Ok(tx.provision_product(1)?)).unwrap();

        let pins = DummyPins::new();
        let sensor = FlowSensor::new(db.clone(), Arc::new(pins.clone()), FLOW_PIN, 1, config).unwrap();
        (db, pins, sensor)
    }

    fn pulse(pins: &DummyPins, count: usize) {
        for _ in 0..count {
            pins.trigger(FLOW_PIN, Edge::Rising);
        }
    }

    #[test]
    fn test_rising_edges_counted() {
        let (_db, pins, sensor) = setup(FlowSensorConfig::default());
        pulse(&pins, 5);
        pins.trigger(FLOW_PIN, Edge::Falling);
        assert_eq!(sensor.pending_pulses(), 5);
    }

    #[test]
    fn test_small_flow_skipped() {
        let (db, pins, sensor) = setup(FlowSensorConfig::default());
        pulse(&pins, 10);

        assert_eq!(sensor.save_flow().unwrap(), None);
        assert_eq!(sensor.pending_pulses(), 10);

        let component_id = sensor.component_id();
        let total = db.with_transaction(|tx| Ok(tx.total_flow_volume(component_id)?)).unwrap();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_volume_threshold_saves() {
        let config = FlowSensorConfig {
            pulses_per_litre: 10.0,
            min_flow_volume_for_save: 1.0,
            ..FlowSensorConfig::default()
        };
        let (db, pins, sensor) = setup(config);
        pulse(&pins, 25);

        let reading = sensor.save_flow().unwrap().unwrap();
        assert_eq!(reading.pulses, 25);
        assert!((reading.volume - 2.5).abs() < f64::EPSILON);
        assert_eq!(sensor.pending_pulses(), 0);

        let component_id = sensor.component_id();
        let total = db.with_transaction(|tx| Ok(tx.total_flow_volume(component_id)?)).unwrap();
        assert!((total - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duration_threshold_saves_empty_reading() {
        let config = FlowSensorConfig {
            max_flow_duration_for_save: 60.0,
            ..FlowSensorConfig::default()
        };
        let (_db, _pins, sensor) = setup(config);

        let later = Instant::now() + Duration::from_secs(61);
        let reading = sensor.save_flow_at(later).unwrap().unwrap();
        assert_eq!(reading.pulses, 0);
        assert!(reading.duration >= 60.0);

        // The read time advanced, so an immediate second save is below both thresholds
        assert_eq!(sensor.save_flow_at(later).unwrap(), None);
    }

    #[test]
    fn test_failed_save_keeps_pulses() {
        let config = FlowSensorConfig {
            pulses_per_litre: 1.0,
            ..FlowSensorConfig::default()
        };
        let (db, pins, sensor) = setup(config);
        pulse(&pins, 3);
        db.shutdown();

        assert!(sensor.save_flow().is_err());
        assert_eq!(sensor.pending_pulses(), 3);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let config = FlowSensorConfig {
            save_interval_seconds: 1,
            ..FlowSensorConfig::default()
        };
        let (_db, _pins, mut sensor) = setup(config);

        sensor.start();
        assert!(sensor.is_running());
        sensor.stop().await;
        assert!(!sensor.is_running());
    }
}
