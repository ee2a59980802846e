//! Async operation log store
//!
//! Every call opens the configured backend on tokio's blocking pool, runs a
//! single transaction and resolves once the engine reports completion.
//! Handles are not cached between calls.

use std::path::Path;

use oplog_storage::StorageError;

use crate::backend::{FileStorage, OpStorage, SqliteOpStorage};
use crate::config::{Backend, Config};
use crate::operation::Operation;
use crate::state::KvState;
use crate::Result;

#[derive(Debug, Clone)]
pub struct OpLogStore {
    config: Config,
}

impl OpLogStore {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the store, creating the data directory and schema on first use.
    pub async fn open_db(&self) -> Result<Box<dyn OpStorage>> {
        let config = self.config.clone();
        let storage = run_blocking(move || open_storage(&config)).await?;

        tracing::info!(
            backend = %self.config.backend,
            data_dir = %self.config.data_dir.display(),
            "Opened operation log"
        );

        Ok(storage)
    }

    /// Upsert one record. Resolves after the write has committed; a failed
    /// commit is returned as `WriteFailed`.
    pub async fn append_op(&self, op: Operation) -> Result<()> {
        let config = self.config.clone();
        run_blocking(move || open_storage(&config)?.append(&op)).await
    }

    /// Every stored record, ascending by id.
    pub async fn load_ops(&self) -> Result<Vec<Operation>> {
        let config = self.config.clone();
        run_blocking(move || open_storage(&config)?.load()).await
    }

    /// Last-write-wins key/value view of the "set" records in the log.
    pub async fn load_state(&self) -> Result<KvState> {
        Ok(KvState::from_ops(self.load_ops().await?))
    }
}

fn open_storage(config: &Config) -> Result<Box<dyn OpStorage>> {
    ensure_dir(&config.data_dir)?;

    Ok(match config.backend {
        Backend::Sqlite => Box::new(SqliteOpStorage::open(&config.database_path)?),
        Backend::File => Box::new(FileStorage::new(&config.log_path)),
    })
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        StorageError::StorageUnavailable(format!("{}: {e}", dir.display())).into()
    })
}

async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
