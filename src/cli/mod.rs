//! Command-line front end for linking an account.

pub mod link;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::LinkConfig;
use crate::error::Result;

/// Link this machine to an external account through the backend's device flow
#[derive(Parser, Debug)]
#[command(name = "devicelink", version, about = "Backend-proxied device authorization")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one device authorization flow and wait for it to finish
    Link(ConfigArgs),
    /// Show the resolved configuration and whether the backend is linked.
    /// An unlinked backend answers by starting an authorization flow, which is
    /// left to expire
    Status(ConfigArgs),
}

/// Where to find the backend.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Base URL of the backend auth endpoints (overrides config and env)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    /// Defaults, then the config file, then `DEVICELINK_*`, then flags.
    pub fn resolve(&self) -> Result<LinkConfig> {
        let _ = dotenvy::dotenv();
        let mut config = self.load_file()?;
        config.apply_env()?;
        self.resolve_with(config)
    }

    /// The `--config` file, or the default location.
    pub fn load_file(&self) -> Result<LinkConfig> {
        let path = self.config.clone().unwrap_or_else(LinkConfig::default_path);
        LinkConfig::load_from_path(path)
    }

    /// Apply flag overrides to `config` and validate the result.
    pub fn resolve_with(&self, mut config: LinkConfig) -> Result<LinkConfig> {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        config.validate()?;
        Ok(config)
    }
}
