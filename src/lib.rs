pub mod cli;
pub mod enrich;
pub mod explore;
pub mod frame;
pub mod io_utils;
pub mod merge;
pub mod model;
pub mod reconcile;
pub mod record;
pub mod table;
pub mod transcode;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("cricket_pred", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Transcode(args) => transcode::execute(&args),
        Commands::Reconcile(args) => reconcile::execute(&args),
        Commands::Merge(args) => merge::execute(&args),
        Commands::Counts(args) => explore::execute(&args),
        Commands::Train(args) => model::execute(&args),
    }
}
