//! Database migrations
//!
//! Schema version 1: a single `ops` collection keyed by `id`.

use rusqlite::{Connection, TransactionBehavior};

use crate::error::is_busy;
use crate::{Result, StorageError};

pub const SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    if get_schema_version(conn)? == SCHEMA_VERSION {
        return Ok(());
    }

    // IMMEDIATE takes the write lock up front so two first-time opens
    // cannot both run the upgrade.
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(upgrade_error)?;

    // Decide under the lock; a concurrent opener may have moved the version.
    let locked_version = read_version(&tx).map_err(upgrade_error)?;
    if locked_version > SCHEMA_VERSION {
        return Err(StorageError::SchemaConflict(format!(
            "database is at schema version {locked_version}, expected {SCHEMA_VERSION}"
        )));
    }
    if locked_version < 1 {
        migrate_v1(&tx)?;
    }

    set_schema_version(&tx, SCHEMA_VERSION)?;
    tx.commit().map_err(upgrade_error)?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(upgrade_error)?;

    read_version(conn).map_err(upgrade_error)
}

fn read_version(conn: &Connection) -> rusqlite::Result<i32> {
    let result = conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    });

    match result {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

fn upgrade_error(err: rusqlite::Error) -> StorageError {
    if is_busy(&err) {
        StorageError::SchemaConflict(format!("schema upgrade blocked: {err}"))
    } else {
        StorageError::StorageUnavailable(err.to_string())
    }
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Running migration v1: ops collection");

    // BLOB affinity leaves integer and text keys in their own storage class,
    // so ORDER BY id sorts integers before text.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS ops (
            id BLOB PRIMARY KEY NOT NULL,
            body TEXT NOT NULL
        );
    "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let version = read_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let rows: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_held_upgrade_lock_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.db");

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE").unwrap();

        let mut conn = Connection::open(&path).unwrap();
        conn.busy_timeout(std::time::Duration::from_millis(50))
            .unwrap();

        let err = run_migrations(&mut conn).unwrap_err();
        assert!(matches!(err, StorageError::SchemaConflict(_)));

        holder.execute_batch("ROLLBACK").unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(read_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_schema_is_a_conflict() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();

        let err = run_migrations(&mut conn).unwrap_err();
        assert!(matches!(err, StorageError::SchemaConflict(_)));

        // Never downgraded
        assert_eq!(read_version(&conn).unwrap(), SCHEMA_VERSION + 1);
    }
}
