mod auth;
mod cli;
mod config;
mod error;
mod gitlab;
mod monitor;
mod notify;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting ciwatch - GitLab Pipeline Watcher");
    cli.execute().await?;

    Ok(())
}
