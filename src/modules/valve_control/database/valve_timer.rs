use rusqlite::{params, Connection, OptionalExtension, Result};

use super::TimerRow;

pub(super) fn latest_timer_config(conn: &Connection, component_id: i64) -> Result<Option<TimerRow>> {
    conn.query_row(
        "SELECT id, enabled, start_time, end_time, created
         FROM valve_timer
         WHERE component_id = ?1
         ORDER BY id DESC
         LIMIT 1",
        params![component_id],
        |row| {
            Ok(TimerRow {
                id: row.get(0)?,
                enabled: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                created: row.get(4)?,
            })
        },
    )
    .optional()
}

pub(super) fn insert_timer_config(
    conn: &Connection,
    component_id: i64,
    enabled: bool,
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO valve_timer (component_id, enabled, start_time, end_time)
         VALUES (?1, ?2, ?3, ?4)",
        params![component_id, enabled as i64, start_time, end_time],
    )?;

    Ok(conn.last_insert_rowid())
}
