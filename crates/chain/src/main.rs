//! sama-ledger binary: config, tracing, then the CLI harness.
use anyhow::Result;
use clap::Parser;

use sama_chain::cli::{load_config, run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = load_config(&cli.config)?;
    if let Some(level) = &cli.log_level {
        cfg.log_level = level.clone();
    }

    tracing_subscriber::fmt()
        .with_max_level(cfg.tracing_level())
        .with_target(false)
        .init();

    run_cli(cli, cfg)
}
