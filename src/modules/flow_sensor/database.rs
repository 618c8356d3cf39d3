// src/modules/flow_sensor/database.rs

use rusqlite::{params, Connection, Result};

/// Trait to add flow-rate storage to a connection (or a transaction, through deref)
pub trait FlowSensorDatabase {
    fn init_flow_schema(&self) -> Result<()>;
    fn insert_flow_rate(&self, component_id: i64, flow_volume: f64, flow_duration: f64) -> Result<i64>;
    fn total_flow_volume(&self, component_id: i64) -> Result<f64>;
}

impl FlowSensorDatabase for Connection {
    fn init_flow_schema(&self) -> Result<()> {
        self.execute(
            "CREATE TABLE IF NOT EXISTS flow_rate (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_id INTEGER NOT NULL REFERENCES component(id),
                flow_volume REAL NOT NULL,
                flow_duration REAL NOT NULL,
                created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(())
    }

    fn insert_flow_rate(&self, component_id: i64, flow_volume: f64, flow_duration: f64) -> Result<i64> {
        self.execute(
            "INSERT INTO flow_rate (component_id, flow_volume, flow_duration) VALUES (?1, ?2, ?3)",
            params![component_id, flow_volume, flow_duration],
        )?;

        Ok(self.last_insert_rowid())
    }

    fn total_flow_volume(&self, component_id: i64) -> Result<f64> {
        self.query_row(
            "SELECT COALESCE(SUM(flow_volume), 0.0) FROM flow_rate WHERE component_id = ?1",
            params![component_id],
            |row| row.get(0),
        )
    }
}
