//! `vpnctl servers`: list the configured inventory.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;

/// Run the servers command.
///
/// # Errors
///
/// Returns an error if rendering fails.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    tracing::debug!(path = %app.config_path.display(), "listing servers");
    app.renderer().render_servers(&app.config.servers)?;
    Ok(ExitCode::SUCCESS)
}
