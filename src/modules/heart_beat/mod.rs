// src/modules/heart_beat/mod.rs

pub mod database;
pub use database::HeartBeatDatabase;

use std::time::Duration;

use crate::error::Result;
use crate::util::database::Database;
use crate::util::task::PeriodicTask;
use crate::{log_debug, log_error, log_info};

/// Periodically records that the product is alive.
#[derive(Debug)]
pub struct HeartBeat {
    db: Database,
    product_id: i64,
    interval: Duration,
    task: Option<PeriodicTask>,
}

impl HeartBeat {
    pub fn new(db: Database, product_id: i64, interval: Duration) -> Self {
        Self {
            db,
            product_id,
            interval,
            task: None,
        }
    }

    pub fn beat(&self) -> Result<i64> {
        beat(&self.db, self.product_id)
    }

    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let db = self.db.clone();
        let product_id = self.product_id;
        self.task = Some(PeriodicTask::spawn("heart-beat", self.interval, move || {
            // Failures are reported and the next beat is attempted as usual
            if let Err(e) = beat(&db, product_id) {
                log_error!(error = %e, "Failed to send heart beat");
            }
        }));
    }

    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.stop().await;
            log_info!("Heart beat stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

fn beat(db: &Database, product_id: i64) -> Result<i64> {
    let id = db.with_transaction(|tx| Ok(tx.insert_heart_beat(product_id)?))?;
    log_debug!(product_id, record_id = id, "❤️ Heart beat sent successfully");
    Ok(id)
}
