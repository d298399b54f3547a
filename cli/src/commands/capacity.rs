//! `vpnctl capacity`: issued/maximum configs per server.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vpnctl_common::{ClientRecord, fleet_capacity};

use crate::app::AppContext;

/// Arguments for the capacity command.
#[derive(Args, Debug)]
pub struct CapacityArgs {
    /// JSON array of client records exported from your store
    #[arg(long)]
    pub records: Option<PathBuf>,
}

/// Run the capacity command.
///
/// # Errors
///
/// Returns an error if the records file is unreadable or malformed.
pub fn run(app: &AppContext, args: &CapacityArgs) -> Result<ExitCode> {
    let records = match &args.records {
        Some(path) => load_records(path)?,
        None => Vec::new(),
    };
    let rows = fleet_capacity(&app.config.servers, &records);
    app.renderer().render_capacity(&rows)?;
    Ok(ExitCode::SUCCESS)
}

fn load_records(path: &Path) -> Result<Vec<ClientRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
}
