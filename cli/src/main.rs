//! vpnctl - provision and revoke VPN client credentials over SSH

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vpnctl_cli::cli::Cli;
use vpnctl_cli::domain::ProvisionError;
use vpnctl_cli::output::OutputContext;
use vpnctl_cli::output::json::format_error;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "VPNCTL_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.is_json();
    let no_color = cli.no_color;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            if json {
                let code = e
                    .downcast_ref::<ProvisionError>()
                    .map_or("error", ProvisionError::code);
                match format_error(&format!("{e:#}"), code) {
                    Ok(text) => println!("{text}"),
                    Err(_) => eprintln!("Error: {e:#}"),
                }
            } else {
                OutputContext::new(no_color, false).error(&format!("Error: {e:#}"));
            }
            ExitCode::FAILURE
        }
    }
}
