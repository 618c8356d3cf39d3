// src/sprinkler.rs
//! Wires the runtime together: store, pins, valve switch, controllers, engine,
//! flow sensor and heart beat.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::SprinklerConfig;
use crate::error::{Result, SprinklerError};
use crate::modules::component::ComponentDatabase;
use crate::modules::flow_sensor::FlowSensor;
use crate::modules::heart_beat::HeartBeat;
use crate::modules::valve_control::{
    RemoteJobController, TimerController, ValveManager, ValveSwitch,
};
use crate::util::database::Database;
use crate::util::io::pins::PinDriver;
use crate::{log_error, log_info, log_warn};

#[derive(Debug)]
pub struct Sprinkler {
    config: SprinklerConfig,
    db: Database,
    pins: Arc<dyn PinDriver>,
    manager: ValveManager,
    flow_sensor: Option<FlowSensor>,
    heart_beat: HeartBeat,
    keep_alive: Option<JoinHandle<()>>,
}

impl Sprinkler {
    /// Open the configured database and build every component.
    pub fn new(config: SprinklerConfig, pins: Arc<dyn PinDriver>) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.database_path)?;
        Self::with_database(config, db, pins)
    }

    pub fn with_database(config: SprinklerConfig, db: Database, pins: Arc<dyn PinDriver>) -> Result<Self> {
        let product_id = config.product_id;

        db.init_all_schemas()?;
        db.with_transaction(|tx| Ok(tx.provision_product(product_id)?))?;

        let switch = ValveSwitch::new(db.clone(), pins.clone(), config.valve_pin, product_id)?;
        if let Err(e) = switch.sync_from_store() {
            log_warn!(error = %e, "Could not restore valve state from store, starting closed");
        }

        let manager = ValveManager::new(switch, config.update_interval());
        manager.register_controller(Box::new(RemoteJobController::new(db.clone(), product_id)?));
        manager.register_controller(Box::new(TimerController::new(db.clone(), product_id)?));

        let flow_sensor = match config.flow_sensor.pin {
            Some(pin) => Some(FlowSensor::new(
                db.clone(),
                pins.clone(),
                pin,
                product_id,
                config.flow_sensor.clone(),
            )?),
            None => {
                log_info!("No flow sensor pin configured, flow will not be recorded");
                None
            }
        };

        let heart_beat = HeartBeat::new(db.clone(), product_id, config.heart_beat_interval());

        log_info!(product_id, "🌱 Application is up and running");

        Ok(Self {
            config,
            db,
            pins,
            manager,
            flow_sensor,
            heart_beat,
            keep_alive: None,
        })
    }

    pub fn config(&self) -> &SprinklerConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn manager(&self) -> &ValveManager {
        &self.manager
    }

    pub fn flow_sensor(&self) -> Option<&FlowSensor> {
        self.flow_sensor.as_ref()
    }

    /// Spawn every background loop. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        if self.keep_alive.is_none() {
            self.keep_alive = Some(self.db.spawn_keep_alive(self.config.connection_ping_interval()));
        }
        self.manager.start();
        if let Some(flow_sensor) = self.flow_sensor.as_mut() {
            flow_sensor.start();
        }
        self.heart_beat.start();
    }

    /// Stop the loops, leave the valve closed and release pins and store.
    pub async fn shutdown(mut self) -> Result<()> {
        log_info!("Shutting down");

        let heart_beat = &mut self.heart_beat;
        let flow_sensor = &mut self.flow_sensor;
        futures::join!(heart_beat.stop(), async move {
            if let Some(flow_sensor) = flow_sensor {
                flow_sensor.stop().await;
            }
        });

        if self.manager.is_running() {
            self.manager.stop().await;
        }

        let closed = match self.manager.switch().close() {
            Ok(_) | Err(SprinklerError::InvalidTarget(_)) => Ok(()),
            Err(e) => {
                log_error!(error = %e, "Failed to close valve during shutdown");
                Err(e)
            }
        };

        if let Err(e) = self.pins.cleanup() {
            log_error!(error = %e, "Failed to clean up pins");
        }

        self.db.shutdown();
        if let Some(keep_alive) = self.keep_alive.take() {
            if let Err(e) = keep_alive.await {
                log_error!(error = %e, "Keep-alive task did not exit cleanly");
            }
        }

        log_info!("Shutdown complete");
        closed
    }
}
