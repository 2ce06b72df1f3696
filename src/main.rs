//! A utility for loading newline-delimited JSON exports from Google Cloud
//! Storage into BigQuery tables.

#![warn(rust_2018_idioms, unused_extern_crates, clippy::all)]

use clap::Parser;
use std::process;

mod clouds;
mod cmd;
mod common;
mod config;
mod loader;
mod logging;
mod resolver;
mod schema;
mod table_name;
mod wait;

use crate::common::*;

#[tokio::main]
async fn main() {
    logging::init();
    let opt = cmd::Opt::parse();
    debug!("{:?}", opt);
    if let Err(err) = cmd::run(opt).await {
        error!("{:?}", err);
        process::exit(1);
    }
}
