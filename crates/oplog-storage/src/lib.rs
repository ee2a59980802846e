//! OpLog Storage Layer
//!
//! SQLite-backed persistence for the operation log.
//! Writes go through a single transaction per call; reads scan with a cursor.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
