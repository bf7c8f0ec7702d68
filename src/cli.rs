use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::Token;
use crate::config::Config;
use crate::monitor::{Credentials, Monitor, WatchSettings};
use crate::notify::ConsoleSink;
use crate::output;

#[derive(Parser)]
#[command(name = "ciwatch")]
#[command(author, version, about = "GitLab Pipeline Watcher", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ConnectionArgs {
    /// GitLab personal access token
    #[arg(short, long, env = "GITLAB_TOKEN")]
    token: Option<String>,

    /// GitLab instance base URL
    #[arg(short, long)]
    url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch your pipelines and notify on status changes until interrupted
    Watch {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Seconds between poll cycles (minimum 10)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Do not notify when pipelines pass
        #[arg(long, default_value_t = false)]
        no_notify_success: bool,

        /// Do not notify when pipelines fail
        #[arg(long, default_value_t = false)]
        no_notify_failure: bool,
    },
    /// Run a single poll cycle and print the tracked pipelines
    Check {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Watch {
                connection,
                interval,
                no_notify_success,
                no_notify_failure,
            } => {
                let mut settings = merge_settings(&config, connection);
                if let Some(interval) = interval {
                    settings.interval_secs = *interval;
                }
                if *no_notify_success {
                    settings.notifications.on_success = false;
                }
                if *no_notify_failure {
                    settings.notifications.on_failure = false;
                }
                execute_watch(settings).await
            }
            Commands::Check { connection } => {
                execute_check(merge_settings(&config, connection)).await
            }
        }
    }
}

/// Command-line flags win over the configuration file.
fn merge_settings(config: &Config, connection: &ConnectionArgs) -> WatchSettings {
    let mut settings = config.watch_settings();

    if let Some(token) = &connection.token {
        let base_url = connection
            .url
            .clone()
            .unwrap_or_else(|| config.gitlab.base_url.clone());
        settings.credentials = Some(Credentials {
            base_url,
            token: Token::from(token.as_str()),
        });
    } else if let (Some(url), Some(credentials)) = (&connection.url, &mut settings.credentials) {
        credentials.base_url = url.clone();
    }

    settings
}

fn require_credentials(settings: &WatchSettings) -> Result<()> {
    if settings.credentials.is_none() {
        bail!(
            "No GitLab token configured. Pass --token, set GITLAB_TOKEN, \
             or add one to ciwatch.toml"
        );
    }
    Ok(())
}

async fn execute_watch(settings: WatchSettings) -> Result<()> {
    require_credentials(&settings)?;

    let mut monitor = Monitor::new(settings, Arc::new(ConsoleSink));
    monitor.start().await?;

    info!("Watching pipelines, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    monitor.stop();
    Ok(())
}

async fn execute_check(settings: WatchSettings) -> Result<()> {
    require_credentials(&settings)?;

    let mut monitor = Monitor::new(settings, Arc::new(ConsoleSink));
    monitor.run_once().await?;

    output::print_snapshot(&monitor.snapshot().await);
    Ok(())
}
