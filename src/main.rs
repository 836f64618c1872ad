mod api;
mod cli;
mod config;
mod error;
mod monitor;
mod revision;
mod selector;
mod session;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting revwatch - project comment monitor");
    cli.execute().await?;

    Ok(())
}
