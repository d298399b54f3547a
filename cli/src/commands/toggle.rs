//! `vpnctl enable` / `vpnctl disable`: toggle a client in the live config.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::commands::Target;

/// Arguments for the enable and disable commands.
#[derive(Args, Debug)]
pub struct ToggleArgs {
    #[command(flatten)]
    pub target: Target,

    /// Client UUID (xray) or peer public key (amneziawg)
    pub client_id: String,

    /// Client name to restore (xray only; defaults to the ledger name)
    #[arg(long)]
    pub name: Option<String>,
}

/// Run the enable or disable command.
///
/// # Errors
///
/// Returns an error if the client is unknown or the remote update fails.
pub async fn run(app: &AppContext, args: ToggleArgs, enabled: bool) -> Result<ExitCode> {
    let server = app.server(&args.target.server)?;
    let changed = app
        .provisioner
        .set_enabled(
            server,
            args.target.protocol,
            &args.client_id,
            args.name.as_deref(),
            enabled,
        )
        .await?;
    app.renderer()
        .render_toggled(&args.client_id, enabled, changed)?;
    Ok(ExitCode::SUCCESS)
}
