//! `vpnctl add`: issue a new credential.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;
use vpnctl_common::ServerLoad;

use crate::app::AppContext;
use crate::commands::Target;

/// Arguments for the add command.
#[derive(Args, Debug)]
pub struct AddArgs {
    #[command(flatten)]
    pub target: Target,

    /// Display name of the client
    pub name: String,

    /// Configs already issued on the server, as counted by your records
    #[arg(long, default_value_t = 0)]
    pub issued: u32,

    /// Also print the AmneziaWG client private key (needed later by `wg-conf`)
    #[arg(long)]
    pub show_private_key: bool,
}

/// Run the add command.
///
/// # Errors
///
/// Returns an error if the server is unknown, ineligible, at capacity, or
/// the remote update fails.
pub async fn run(app: &AppContext, args: AddArgs) -> Result<ExitCode> {
    let server = app.server(&args.target.server)?;
    let load = ServerLoad::new(server.max_configs, args.issued);
    let issued = app
        .provisioner
        .issue(server, args.target.protocol, &args.name, load)
        .await?;
    app.renderer().render_issued(server, &issued, args.show_private_key)?;
    Ok(ExitCode::SUCCESS)
}
