//! `vpnctl remove`: revoke a credential.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::commands::Target;

/// Arguments for the remove command.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub target: Target,

    /// Client UUID (xray) or peer public key (amneziawg)
    pub client_id: String,
}

/// Run the remove command.
///
/// # Errors
///
/// Returns an error if the client is unknown or the remote update fails.
pub async fn run(app: &AppContext, args: RemoveArgs) -> Result<ExitCode> {
    let server = app.server(&args.target.server)?;
    app.provisioner
        .revoke(server, args.target.protocol, &args.client_id)
        .await?;
    app.renderer()
        .render_revoked(server, args.target.protocol, &args.client_id)?;
    Ok(ExitCode::SUCCESS)
}
