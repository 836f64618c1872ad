use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::api::ApiClient;
use crate::config::{Config, ConfigStore};
use crate::monitor::Monitor;
use crate::session::Session;

#[derive(Parser)]
#[command(name = "revwatch")]
#[command(author, version, about = "Project comment monitor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Session cookie, overriding the configured one
    #[arg(long, global = true, env = "REVWATCH_COOKIE")]
    cookie: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the configured project until interrupted
    Run,
    /// Execute a single polling cycle and exit
    Check,
}

impl Cli {
    fn build_monitor(&self) -> Result<Monitor> {
        let path = Config::locate(self.config.as_deref())?;
        let mut config = Config::load(&path)?;
        if let Some(cookie) = &self.cookie {
            config.cookie = cookie.clone();
        }

        info!("Watching project {} at {}", config.project_id, config.base_url);

        let base_url = Url::parse(&config.base_url)?;
        let store = Arc::new(ConfigStore::new(path, config.clone()));
        let session = Arc::new(Session::new(base_url, config.cookie.clone(), store)?);
        let api = ApiClient::new(&config.base_url, session.clone())?;

        Ok(Monitor::new(api, session, &config))
    }

    pub async fn execute(&self) -> Result<()> {
        let monitor = self.build_monitor()?;

        match &self.command {
            Commands::Run => monitor.run().await?,
            Commands::Check => {
                let outcome = monitor.run_cycle().await;
                info!("Cycle finished: {outcome:?}");
            }
        }

        Ok(())
    }
}
