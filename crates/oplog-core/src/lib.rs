//! OpLog Core
//!
//! Durable, append-only storage of opaque operation records.
//! Records are upserted by `id` and read back in ascending id order.

mod backend;
mod config;
mod error;
mod operation;
mod state;
mod store;

pub use backend::{FileStorage, OpStorage, SqliteOpStorage};
pub use config::{Backend, Config, DATA_DIR_ENV};
pub use error::{CoreError, ErrorKind};
pub use operation::{OpId, Operation};
pub use state::KvState;
pub use store::OpLogStore;

pub use oplog_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
