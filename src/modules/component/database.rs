// src/modules/component/database.rs
// Static provisioning data: component types and the components of a product

use rusqlite::{params, Connection, OptionalExtension, Result};

use super::ComponentKind;

/// Trait to add component lookups to a connection (or a transaction, through deref)
pub trait ComponentDatabase {
    fn init_component_schema(&self) -> Result<()>;
    fn provision_product(&self, product_id: i64) -> Result<()>;
    fn component_id(&self, product_id: i64, kind: ComponentKind) -> Result<Option<i64>>;
}

impl ComponentDatabase for Connection {
    fn init_component_schema(&self) -> Result<()> {
        self.execute(
            "CREATE TABLE IF NOT EXISTS component_type (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_name TEXT NOT NULL UNIQUE
            )",
            [],
        )?;

        self.execute(
            "CREATE TABLE IF NOT EXISTS component (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL,
                component_type_id INTEGER NOT NULL REFERENCES component_type(id),
                UNIQUE (product_id, component_type_id)
            )",
            [],
        )?;

        Ok(())
    }

    fn provision_product(&self, product_id: i64) -> Result<()> {
        for kind in ComponentKind::all() {
            self.execute(
                "INSERT OR IGNORE INTO component_type (component_name) VALUES (?1)",
                params![kind.as_str()],
            )?;

            self.execute(
                "INSERT OR IGNORE INTO component (product_id, component_type_id)
                 SELECT ?1, id FROM component_type WHERE component_name = ?2",
                params![product_id, kind.as_str()],
            )?;
        }

        Ok(())
    }

    fn component_id(&self, product_id: i64, kind: ComponentKind) -> Result<Option<i64>> {
        self.query_row(
            "SELECT c.id
             FROM component c
             JOIN component_type ct ON ct.id = c.component_type_id
             WHERE c.product_id = ?1 AND ct.component_name = ?2",
            params![product_id, kind.as_str()],
            |row| row.get(0),
        )
        .optional()
    }
}
