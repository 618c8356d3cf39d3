use rusqlite::{Connection, Result};

pub(super) fn init_valve_schema(conn: &Connection) -> Result<()> {
    // Append-only log of every committed valve position
    conn.execute(
        "CREATE TABLE IF NOT EXISTS valve_state (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            component_id INTEGER NOT NULL REFERENCES component(id),
            state INTEGER NOT NULL,
            created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Jobs submitted by front-ends; completion_status is NULL until the valve manager answers
    conn.execute(
        "CREATE TABLE IF NOT EXISTS valve_remote_switch_job (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            component_id INTEGER NOT NULL REFERENCES component(id),
            state INTEGER,
            completion_status INTEGER,
            created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS valve_timer (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            component_id INTEGER NOT NULL REFERENCES component(id),
            enabled INTEGER,
            start_time,
            end_time,
            created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_valve_state_component
         ON valve_state(component_id, id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_remote_job_component
         ON valve_remote_switch_job(component_id, id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_valve_timer_component
         ON valve_timer(component_id, id)",
        [],
    )?;

    Ok(())
}
