use rusqlite::{params, Connection, OptionalExtension, Result};

use super::RemoteJobRow;

pub(super) fn latest_remote_job(conn: &Connection, component_id: i64) -> Result<Option<RemoteJobRow>> {
    conn.query_row(
        "SELECT id, state, completion_status, created
         FROM valve_remote_switch_job
         WHERE component_id = ?1
         ORDER BY id DESC
         LIMIT 1",
        params![component_id],
        |row| {
            Ok(RemoteJobRow {
                id: row.get(0)?,
                state: row.get(1)?,
                completion_status: row.get(2)?,
                created: row.get(3)?,
            })
        },
    )
    .optional()
}

pub(super) fn insert_remote_job(conn: &Connection, component_id: i64, state: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO valve_remote_switch_job (component_id, state) VALUES (?1, ?2)",
        params![component_id, state],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Returns the number of rows touched; 0 means the job was already answered.
pub(super) fn record_job_completion(conn: &Connection, job_id: i64, completion_status: i64) -> Result<usize> {
    conn.execute(
        "UPDATE valve_remote_switch_job
         SET completion_status = ?1
         WHERE id = ?2 AND completion_status IS NULL",
        params![completion_status, job_id],
    )
}
