// src/modules/heart_beat/database.rs

use rusqlite::{params, Connection, Result};

/// Trait to add product heart beats to a connection (or a transaction, through deref)
pub trait HeartBeatDatabase {
    fn init_heart_beat_schema(&self) -> Result<()>;
    fn insert_heart_beat(&self, product_id: i64) -> Result<i64>;
    fn count_heart_beats(&self, product_id: i64) -> Result<i64>;
}

impl HeartBeatDatabase for Connection {
    fn init_heart_beat_schema(&self) -> Result<()> {
        self.execute(
            "CREATE TABLE IF NOT EXISTS product_heart_beat (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL,
                created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(())
    }

    fn insert_heart_beat(&self, product_id: i64) -> Result<i64> {
        self.execute(
            "INSERT INTO product_heart_beat (product_id) VALUES (?1)",
            params![product_id],
        )?;

        Ok(self.last_insert_rowid())
    }

    fn count_heart_beats(&self, product_id: i64) -> Result<i64> {
        self.query_row(
            "SELECT COUNT(*) FROM product_heart_beat WHERE product_id = ?1",
            params![product_id],
            |row| row.get(0),
        )
    }
}
