//! `vpnctl wg-conf`: rebuild the client file of an existing AmneziaWG peer.

use anyhow::{Context, Result};
use clap::Args;
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::ExistingPeer;

/// Arguments for the wg-conf command.
#[derive(Args, Debug)]
pub struct WgConfArgs {
    /// Server name from the inventory
    pub server: String,

    /// Peer public key
    pub public_key: String,

    /// File holding the peer's base64 private key
    #[arg(long)]
    pub private_key_file: PathBuf,

    /// Client name used in the file name
    #[arg(long)]
    pub name: String,

    /// Tunnel address (looked up in the ledger when omitted)
    #[arg(long)]
    pub address: Option<String>,
}

/// Run the wg-conf command.
///
/// # Errors
///
/// Returns an error if the key file is unreadable, the address cannot be
/// resolved, or the server's interface lacks obfuscation parameters.
pub async fn run(app: &AppContext, args: WgConfArgs) -> Result<ExitCode> {
    let server = app.server(&args.server)?;
    let private_key = tokio::fs::read_to_string(&args.private_key_file)
        .await
        .with_context(|| format!("cannot read {}", args.private_key_file.display()))?;
    let private_key = SecretString::from(private_key.trim().to_string());
    let path = app
        .provisioner
        .client_artifact(
            server,
            &ExistingPeer {
                public_key: &args.public_key,
                private_key: &private_key,
                client_name: &args.name,
                address: args.address.as_deref(),
            },
        )
        .await?;
    app.renderer().render_artifact(&path)?;
    Ok(ExitCode::SUCCESS)
}
