//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, OutputFlags};
use crate::commands;

/// Provision and revoke VPN client credentials on remote servers
#[derive(Parser)]
#[command(
    name = "vpnctl",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Config file (default: $VPNCTL_CONFIG or ~/.vpnctl/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List configured servers
    Servers,

    /// Issue a credential
    Add(commands::add::AddArgs),

    /// Revoke a credential
    Remove(commands::remove::RemoveArgs),

    /// Re-admit a disabled client
    Enable(commands::toggle::ToggleArgs),

    /// Stop accepting a client without revoking it
    Disable(commands::toggle::ToggleArgs),

    /// List clients on a server
    Clients(commands::clients::ClientsArgs),

    /// Print the VLESS link of an Xray client
    Url(commands::url::UrlArgs),

    /// Rebuild an AmneziaWG client config file
    #[command(name = "wg-conf")]
    WgConf(commands::wg_conf::WgConfArgs),

    /// Show issued and free configs per server
    Capacity(commands::capacity::CapacityArgs),
}

impl Cli {
    /// Returns `true` when `--json` was given.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the
    /// command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            config,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            config,
        })?;

        match command {
            Command::Servers => commands::servers::run(&app),
            Command::Add(args) => commands::add::run(&app, args).await,
            Command::Remove(args) => commands::remove::run(&app, args).await,
            Command::Enable(args) => commands::toggle::run(&app, args, true).await,
            Command::Disable(args) => commands::toggle::run(&app, args, false).await,
            Command::Clients(args) => commands::clients::run(&app, args).await,
            Command::Url(args) => commands::url::run(&app, args).await,
            Command::WgConf(args) => commands::wg_conf::run(&app, args).await,
            Command::Capacity(args) => commands::capacity::run(&app, &args),
        }
    }
}
