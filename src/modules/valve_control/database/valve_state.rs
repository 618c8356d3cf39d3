use rusqlite::{params, Connection, OptionalExtension, Result};

use super::ValveStateRow;

pub(super) fn latest_valve_state(conn: &Connection, component_id: i64) -> Result<Option<ValveStateRow>> {
    conn.query_row(
        "SELECT id, state, created
         FROM valve_state
         WHERE component_id = ?1
         ORDER BY id DESC
         LIMIT 1",
        params![component_id],
        |row| {
            Ok(ValveStateRow {
                id: row.get(0)?,
                state: row.get(1)?,
                created: row.get(2)?,
            })
        },
    )
    .optional()
}

pub(super) fn insert_valve_state(conn: &Connection, component_id: i64, state: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO valve_state (component_id, state) VALUES (?1, ?2)",
        params![component_id, state],
    )?;

    Ok(conn.last_insert_rowid())
}
