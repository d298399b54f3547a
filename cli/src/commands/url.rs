//! `vpnctl url`: regenerate the VLESS link of an existing Xray client.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;

/// Arguments for the url command.
#[derive(Args, Debug)]
pub struct UrlArgs {
    /// Server name from the inventory
    pub server: String,

    /// Client UUID
    pub client_id: String,

    /// Client name placed in the link fragment
    #[arg(long)]
    pub name: String,
}

/// Run the url command.
///
/// # Errors
///
/// Returns an error if the client is not in the ledger or the server's
/// public key cannot be read.
pub async fn run(app: &AppContext, args: UrlArgs) -> Result<ExitCode> {
    let server = app.server(&args.server)?;
    let link = app
        .provisioner
        .client_url(server, &args.client_id, &args.name)
        .await?;
    app.renderer().render_link(&link)?;
    Ok(ExitCode::SUCCESS)
}
