//! Command parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::common::*;
use crate::config::Config;

pub(crate) mod batch;
pub(crate) mod event;
pub(crate) mod serve;

/// Command-line options.
#[derive(Debug, Parser)]
#[command(
    name = "bqload",
    about = "Load newline-delimited JSON exports from Cloud Storage into BigQuery."
)]
pub(crate) struct Opt {
    /// Path to the configuration file.
    #[arg(long, default_value = "bqload.toml")]
    pub(crate) config: String,

    /// The command to run.
    #[command(subcommand)]
    pub(crate) cmd: Command,
}

/// The command to run.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Reload the three dataset exports from scratch.
    Batch,

    /// Serve the HTTP trigger for storage notifications.
    Serve {
        /// Address to listen on (overrides the config file).
        #[arg(long)]
        listen: Option<String>,
    },

    /// Handle a single storage event payload.
    Event {
        /// Path to the event JSON (defaults to stdin).
        #[arg(long)]
        payload: Option<PathBuf>,
    },
}

pub(crate) async fn run(opt: Opt) -> Result<()> {
    let config = Config::load(&opt.config)?;
    match opt.cmd {
        Command::Batch => batch::run(config).await,
        Command::Serve { listen } => serve::run(config, listen).await,
        Command::Event { payload } => event::run(config, payload).await,
    }
}
