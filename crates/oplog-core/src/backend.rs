//! Storage backends for operation records

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use oplog_storage::{Database, StorageError};

use crate::error::CoreError;
use crate::operation::{OpId, Operation};
use crate::Result;

/// Append/load interface every backend implements.
///
/// `append` upserts by id; `load` returns one record per id in ascending
/// id order.
pub trait OpStorage: Send + Sync {
    fn append(&self, op: &Operation) -> Result<()>;
    fn load(&self) -> Result<Vec<Operation>>;
}

/// The `ops` collection in SQLite.
pub struct SqliteOpStorage {
    db: Database,
}

impl SqliteOpStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl OpStorage for SqliteOpStorage {
    fn append(&self, op: &Operation) -> Result<()> {
        let body = op.to_json()?;

        self.db.transaction(|conn| {
            conn.execute(
                "INSERT INTO ops (id, body) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET body = excluded.body",
                rusqlite::params![op.id, body],
            )?;
            Ok(())
        })?;

        tracing::debug!(op_id = %op.id, "Appended operation");
        Ok(())
    }

    fn load(&self) -> Result<Vec<Operation>> {
        let bodies = self.db.read_transaction(|conn| {
            let mut stmt = conn.prepare("SELECT body FROM ops ORDER BY id")?;
            let mut cursor = stmt.query([])?;

            let mut bodies: Vec<String> = Vec::new();
            while let Some(row) = cursor.next()? {
                bodies.push(row.get(0)?);
            }
            Ok(bodies)
        })?;

        let ops = bodies
            .iter()
            .map(|body| Operation::from_json(body))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(count = ops.len(), "Loaded operations");
        Ok(ops)
    }
}

impl Clone for SqliteOpStorage {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

/// One JSON record per line, appended to a plain file.
///
/// Duplicate ids are resolved on load: the last line for an id wins.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OpStorage for FileStorage {
    fn append(&self, op: &Operation) -> Result<()> {
        let mut line = op.to_json()?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                StorageError::StorageUnavailable(format!("{}: {e}", self.path.display()))
            })?;

        // One write_all per record; lines only stay whole under concurrent
        // appenders while they fit in a single append-mode write.
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| StorageError::WriteFailed(format!("{}: {e}", self.path.display())))?;

        tracing::debug!(op_id = %op.id, path = %self.path.display(), "Appended operation");
        Ok(())
    }

    fn load(&self) -> Result<Vec<Operation>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::StorageUnavailable(format!(
                    "{}: {e}",
                    self.path.display()
                ))
                .into())
            }
        };

        let mut latest: BTreeMap<OpId, Operation> = BTreeMap::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let op = Operation::from_json(line).map_err(|e| {
                CoreError::InvalidRecord(format!("{} line {}: {e}", self.path.display(), index + 1))
            })?;
            latest.insert(op.id.clone(), op);
        }

        Ok(latest.into_values().collect())
    }
}
