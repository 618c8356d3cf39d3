// src/util/database.rs
// Shared transactional connection: one SQLite connection, one unit of work at a time

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, Transaction};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Result, SprinklerError};
use crate::{log_debug, log_error, log_info, log_warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the connection lives, so it can be reopened after it dies.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    fn connect(&self) -> Result<Connection> {
        let conn = match self {
            StoreLocation::Memory => Connection::open_in_memory()?,
            StoreLocation::File(path) => Connection::open(path)?,
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }
}

#[derive(Clone)]
pub struct Database {
    location: StoreLocation,
    conn: Arc<Mutex<Option<Connection>>>,
    active: Arc<AtomicBool>,
    closed_tx: Arc<watch::Sender<bool>>,
}

// Manual Debug implementation since Mutex<Connection> doesn't implement Debug
impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .field("conn", &"Arc<Mutex<Option<Connection>>>")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SprinklerError::StorageUnavailable(format!(
                        "Failed to create db directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Self::with_location(StoreLocation::File(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_location(StoreLocation::Memory)
    }

    fn with_location(location: StoreLocation) -> Result<Self> {
        let conn = location.connect()?;
        let (closed_tx, _) = watch::channel(false);

        log_info!(location = ?location, "Database connection opened");

        Ok(Self {
            location,
            conn: Arc::new(Mutex::new(Some(conn))),
            active: Arc::new(AtomicBool::new(true)),
            closed_tx: Arc::new(closed_tx),
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn lock_conn(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic inside a unit of work already rolled its transaction back on unwind.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` inside a transaction while holding the connection exclusively.
    ///
    /// Commits when `work` returns `Ok`, rolls back when it returns `Err`. The
    /// lock is released on every path. A failed rollback is logged and the
    /// error from `work` is returned; a failed commit is returned as is.
    pub fn with_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        if !self.is_active() {
            return Err(SprinklerError::ConnectionClosed);
        }

        let mut guard = self.lock_conn();
        let conn = guard.as_mut().ok_or(SprinklerError::ConnectionClosed)?;
        let tx = conn.transaction()?;

        match work(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    log_error!(error = %rollback_err, "Rollback failed after unit of work error");
                }
                Err(e)
            }
        }
    }

    /// Ping the connection and reopen it if the ping fails. Never raises.
    pub fn revive_if_dead(&self) -> bool {
        if !self.is_active() {
            return false;
        }

        let mut guard = self.lock_conn();
        // shutdown() may have run while we waited for the lock
        if !self.is_active() {
            return false;
        }

        let alive = guard
            .as_ref()
            .map(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok())
            .unwrap_or(false);

        if alive {
            return true;
        }

        log_warn!(location = ?self.location, "Connection ping failed, reconnecting");

        match self.location.connect() {
            Ok(conn) => {
                *guard = Some(conn);
                log_info!("Database connection revived");
                true
            }
            Err(e) => {
                log_error!(error = %e, "Failed to revive database connection");
                false
            }
        }
    }

    /// Periodically call [`Database::revive_if_dead`] until shutdown.
    pub fn spawn_keep_alive(&self, interval: Duration) -> JoinHandle<()> {
        let db = self.clone();
        let mut closed_rx = self.closed_tx.subscribe();

        tokio::spawn(async move {
            log_info!(interval_secs = interval.as_secs(), "Connection keep-alive started");
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            while db.is_active() {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = closed_rx.changed() => break,
                }

                let pinger = db.clone();
                let alive = tokio::task::spawn_blocking(move || pinger.revive_if_dead())
                    .await
                    .unwrap_or(false);
                log_debug!(alive, "Connection keep-alive ping completed");
            }

            log_info!("Connection keep-alive stopped");
        })
    }

    /// Close the connection for good. Later transactions fail with `ConnectionClosed`.
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.closed_tx.send_replace(true);

        let mut guard = self.lock_conn();
        if let Some(conn) = guard.take() {
            if let Err((_, e)) = conn.close() {
                log_error!(error = %e, "Error while closing database connection");
            }
        }

        log_info!("Database connection shut down");
    }

    /// Create every table the runtime uses.
    pub fn init_all_schemas(&self) -> Result<()> {
        use crate::modules::component::ComponentDatabase;
        use crate::modules::flow_sensor::FlowSensorDatabase;
        use crate::modules::heart_beat::HeartBeatDatabase;
        use crate::modules::valve_control::ValveDatabase;

        self.with_transaction(|tx| {
            tx.init_component_schema()?;
            tx.init_valve_schema()?;
            tx.init_flow_schema()?;
            tx.init_heart_beat_schema()?;
            Ok(())
        })
    }
}

/// Parse a stored timestamp. SQLite's `CURRENT_TIMESTAMP` format is UTC; RFC 3339 is also accepted.
pub fn parse_sql_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way SQLite's `CURRENT_TIMESTAMP` does.
pub fn format_sql_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn scratch_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_transaction(|tx| {
            tx.execute("CREATE TABLE scratch (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", [])?;
            Ok(())
        })
        .unwrap();
        db
    }

    fn count_rows(db: &Database) -> i64 {
        db.with_transaction(|tx| Ok(tx.query_row("SELECT COUNT(*) FROM scratch", [], |row| row.get(0))?))
            .unwrap()
    }

    #[test]
    fn test_commit_on_success() {
        let db = scratch_db();

        let inserted = db
            .with_transaction(|tx| Ok(tx.execute("INSERT INTO scratch (name) VALUES ('Test')", [])?))
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(count_rows(&db), 1);
    }

    #[test]
    fn test_rollback_on_database_error() {
        let db = scratch_db();

        let result = db.with_transaction(|tx| {
            tx.execute("INSERT INTO scratch (name) VALUES ('Test')", [])?;
            tx.execute("SELECT * FROM table_not_defined", [])?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(count_rows(&db), 0);
    }

    #[test]
    fn test_rollback_on_other_error() {
        let db = scratch_db();

        let result: Result<()> = db.with_transaction(|tx| {
            tx.execute("INSERT INTO scratch (name) VALUES ('Test')", [])?;
            Err(SprinklerError::MalformedRecord("bad row".into()))
        });

        assert!(matches!(result, Err(SprinklerError::MalformedRecord(_))));
        assert_eq!(count_rows(&db), 0);
    }

    #[test]
    fn test_lock_released_after_panic() {
        let db = scratch_db();
        let panicking = db.clone();

        let joined = thread::spawn(move || {
            let _: Result<()> = panicking.with_transaction(|tx| {
                tx.execute("INSERT INTO scratch (name) VALUES ('Test')", [])?;
                panic!("unit of work blew up");
            });
        })
        .join();

        assert!(joined.is_err());
        assert_eq!(count_rows(&db), 0);
    }

    #[test]
    fn test_synchronised_access() {
        let db = scratch_db();
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let db = db.clone();
                let inside = inside.clone();
                let overlap = overlap.clone();
                thread::spawn(move || {
                    db.with_transaction(|_tx| {
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlap.store(true, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(inside.load(Ordering::SeqCst), 0);
        assert!(!overlap.load(Ordering::SeqCst));
    }

    #[test]
    fn test_revival_does_not_block_transactions() {
        let db = scratch_db();
        let worker = db.clone();
        let checker = db.clone();

        let work = thread::spawn(move || {
            worker.with_transaction(|tx| {
                tx.execute("INSERT INTO scratch (name) VALUES ('during ping')", [])?;
                thread::sleep(Duration::from_millis(50));
                Ok(())
            })
        });
        let pinging = thread::spawn(move || (0..10).all(|_| checker.revive_if_dead()));

        assert!(work.join().unwrap().is_ok());
        assert!(pinging.join().unwrap());
        assert_eq!(count_rows(&db), 1);
    }

    #[test]
    fn test_shutdown_fails_loudly() {
        let db = scratch_db();
        db.shutdown();

        let result = db.with_transaction(|tx| Ok(tx.execute("DELETE FROM scratch", [])?));
        assert!(matches!(result, Err(SprinklerError::ConnectionClosed)));
        assert!(!db.revive_if_dead());
        assert!(!db.is_active());
    }

    #[test]
    fn test_reconnects_dead_file_connection() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::open(&temp_dir.path().join("nested").join("store.db")).unwrap();

        // Simulate a dropped socket.
        db.lock_conn().take();

        assert!(db.revive_if_dead());
        assert!(db
            .with_transaction(|tx| Ok(tx.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
            .is_ok());
    }

    #[tokio::test]
    async fn test_keep_alive_stops_on_shutdown() {
        let db = scratch_db();
        let handle = db.spawn_keep_alive(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(35)).await;
        db.shutdown();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("keep-alive did not stop")
            .unwrap();
    }

    #[test]
    fn test_parse_sql_timestamp() {
        let parsed = parse_sql_timestamp("2024-05-01 10:15:30").unwrap();
        assert_eq!(format_sql_timestamp(&parsed), "2024-05-01 10:15:30");

        let rfc = parse_sql_timestamp("2024-05-01T12:15:30+02:00").unwrap();
        assert_eq!(rfc, parsed);

        assert!(parse_sql_timestamp("yesterday").is_none());
    }
}
