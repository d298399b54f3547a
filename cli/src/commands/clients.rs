//! `vpnctl clients`: list clients on a server without changing anything.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::commands::Target;

/// Arguments for the clients command.
#[derive(Args, Debug)]
pub struct ClientsArgs {
    #[command(flatten)]
    pub target: Target,
}

/// Run the clients command.
///
/// # Errors
///
/// Returns an error if the remote files cannot be read.
pub async fn run(app: &AppContext, args: ClientsArgs) -> Result<ExitCode> {
    let server = app.server(&args.target.server)?;
    let clients = app
        .provisioner
        .inspect(server, args.target.protocol)
        .await?;
    app.renderer()
        .render_clients(server, args.target.protocol, &clients)?;
    Ok(ExitCode::SUCCESS)
}
