//! OpLog - Local test app
//!
//! Opens the operation log, appends records and prints the stored history
//! or the last-write-wins value of a key.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use oplog_core::{Backend, Config, OpId, DATA_DIR_ENV};

/// Append-only operation log on local storage
#[derive(Parser, Debug)]
#[command(name = "oplog")]
#[command(version, about)]
pub struct Cli {
    /// Directory holding the store files
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Storage backend: sqlite or file
    #[arg(long, global = true, default_value = "sqlite")]
    backend: Backend,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the store if it does not exist yet
    Init,

    /// Upsert one record
    Append {
        /// Record id; digits are stored as an integer key
        #[arg(long)]
        id: OpId,

        /// Extra fields as key=value; values that parse as JSON keep their type
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Append a key/value "set" operation with a generated id
    Set {
        key: String,
        value: String,

        #[arg(long, default_value = "local-device")]
        actor: String,
    },

    /// Print the current value of a key set with `set`
    Get { key: String },

    /// Print every stored record as one JSON line
    List,
}

impl Cli {
    fn config(&self) -> Config {
        let data_dir = self.data_dir.clone().unwrap_or_else(Config::data_dir);
        Config::new(data_dir).with_backend(self.backend)
    }
}

pub async fn run() -> Result<()> {
    oplog_core::init_logging();

    let cli = Cli::parse();
    let store = oplog_core::OpLogStore::new(cli.config());

    match cli.command {
        Command::Init => commands::init(&store).await,
        Command::Append { id, fields } => commands::append(&store, id, &fields).await,
        Command::Set { key, value, actor } => commands::set(&store, key, value, actor).await,
        Command::Get { key } => commands::get(&store, &key, &mut std::io::stdout()).await,
        Command::List => commands::list(&store, &mut std::io::stdout()).await,
    }
}
