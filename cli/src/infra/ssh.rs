//! OpenSSH-backed implementation of the `RemoteTransport` port.
//!
//! `connect` starts a control master (`ssh -M -N -f`) on a private socket;
//! commands and sftp transfers are multiplexed over it, and `close` asks
//! the master to exit. All processes go through a `CommandRunner`.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use tempfile::TempDir;
use vpnctl_common::Server;

use crate::application::ports::{CommandRunner, RemoteTransport, TransportConnector};
use crate::domain::shell::sftp_quote;
use crate::domain::{CommandTimeout, ProvisionError, SshSettings};

/// Opens [`OpenSshTransport`]s with the configured ssh options.
#[derive(Debug, Clone)]
pub struct OpenSshConnector<R> {
    runner: R,
    settings: SshSettings,
}

impl<R: CommandRunner + Clone> OpenSshConnector<R> {
    pub fn new(runner: R, settings: SshSettings) -> Self {
        Self { runner, settings }
    }

    fn master_args(&self, server: &Server, socket: &str) -> Vec<String> {
        let mut args = vec![
            "-M".to_string(),
            "-N".to_string(),
            "-f".to_string(),
            "-S".to_string(),
            socket.to_string(),
            "-p".to_string(),
            server.ssh_port.to_string(),
        ];
        if let Some(identity) = &server.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
            args.extend(option("IdentitiesOnly", "yes"));
        }
        args.extend(option("BatchMode", "yes"));
        args.extend(option(
            "ConnectTimeout",
            &self.settings.connect_timeout_secs.to_string(),
        ));
        args.extend(option(
            "StrictHostKeyChecking",
            self.settings.strict_host_key_checking.as_ssh_option(),
        ));
        if let Some(known_hosts) = &self.settings.known_hosts_file {
            args.extend(option("UserKnownHostsFile", &known_hosts.display().to_string()));
        }
        args.extend(option("LogLevel", "ERROR"));
        args.push(server.ssh_destination());
        args
    }
}

fn option(key: &str, value: &str) -> [String; 2] {
    ["-o".to_string(), format!("{key}={value}")]
}

impl<R: CommandRunner + Clone> TransportConnector for OpenSshConnector<R> {
    type Transport = OpenSshTransport<R>;

    async fn connect(&self, server: &Server) -> Result<Self::Transport, ProvisionError> {
        let endpoint = format!("{}:{}", server.ssh_destination(), server.ssh_port);
        let control_dir = tempfile::Builder::new()
            .prefix("vpnctl-ssh-")
            .tempdir()
            .map_err(|e| ProvisionError::local(std::env::temp_dir(), e))?;
        let socket = control_dir.path().join("ctl").display().to_string();

        let args = self.master_args(server, &socket);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        // Leave the handshake a little headroom past ssh's own ConnectTimeout.
        let deadline = self.settings.connect_timeout() + Duration::from_secs(5);
        tracing::debug!(%endpoint, "starting ssh control master");

        match self.runner.run_with_timeout("ssh", &argv, deadline).await {
            Ok(out) if out.status.success() => Ok(OpenSshTransport {
                runner: self.runner.clone(),
                destination: server.ssh_destination(),
                socket,
                command_timeout: self.settings.command_timeout(),
                _control_dir: control_dir,
            }),
            Ok(out) => Err(ProvisionError::Connect {
                endpoint,
                message: failure_message(&out),
            }),
            Err(e) => Err(match e.downcast_ref::<CommandTimeout>() {
                Some(t) => ProvisionError::TransportTimeout {
                    operation: format!("ssh {endpoint}"),
                    timeout: t.timeout,
                },
                None => ProvisionError::Connect {
                    endpoint,
                    message: format!("{e:#}"),
                },
            }),
        }
    }
}

/// One authenticated connection, multiplexed over a control socket.
///
/// The socket's directory is removed when the transport is dropped.
#[derive(Debug)]
pub struct OpenSshTransport<R> {
    runner: R,
    destination: String,
    socket: String,
    command_timeout: Duration,
    _control_dir: TempDir,
}

impl<R: CommandRunner> OpenSshTransport<R> {
    async fn sftp(&self, batch: &str, remote: &str) -> Result<(), ProvisionError> {
        let control = format!("ControlPath={}", self.socket);
        let args = ["-q", "-b", "-", "-o", control.as_str(), self.destination.as_str()];
        match self.runner.run_with_stdin("sftp", &args, batch.as_bytes()).await {
            Ok(out) if out.status.success() && out.stderr.is_empty() => Ok(()),
            Ok(out) => Err(ProvisionError::file_sync(remote, failure_message(&out))),
            Err(e) => Err(runner_error(e, batch.trim())),
        }
    }
}

impl<R: CommandRunner> RemoteTransport for OpenSshTransport<R> {
    async fn exec(&self, command: &str) -> Result<String, ProvisionError> {
        tracing::debug!(destination = %self.destination, %command, "remote exec");
        let args = [
            "-S",
            self.socket.as_str(),
            "-o",
            "LogLevel=ERROR",
            self.destination.as_str(),
            "--",
            command,
        ];
        let out = self
            .runner
            .run_with_timeout("ssh", &args, self.command_timeout)
            .await
            .map_err(|e| runner_error(e, command))?;
        check_output(command, &out)
    }

    async fn fetch(&self, remote: &str, local: &Path) -> Result<(), ProvisionError> {
        tracing::debug!(destination = %self.destination, %remote, local = %local.display(), "fetch");
        let batch = format!(
            "get {} {}\n",
            sftp_quote(remote),
            sftp_quote(&local.display().to_string())
        );
        self.sftp(&batch, remote).await
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<(), ProvisionError> {
        tracing::debug!(destination = %self.destination, local = %local.display(), %remote, "push");
        let batch = format!(
            "put {} {}\n",
            sftp_quote(&local.display().to_string()),
            sftp_quote(remote)
        );
        self.sftp(&batch, remote).await
    }

    async fn close(&self) -> Result<(), ProvisionError> {
        let command = "ssh -O exit";
        let args = ["-S", self.socket.as_str(), "-O", "exit", self.destination.as_str()];
        let out = self
            .runner
            .run_with_timeout("ssh", &args, self.command_timeout)
            .await
            .map_err(|e| runner_error(e, command))?;
        // The master acknowledges on stderr; only the status matters here.
        if out.status.success() {
            Ok(())
        } else {
            Err(ProvisionError::Transport {
                command: command.to_string(),
                message: failure_message(&out),
            })
        }
    }
}

/// Apply the remote-command failure rule: a non-zero exit or any stderr
/// output fails, and stdout is returned otherwise.
///
/// # Errors
///
/// Returns `Transport` carrying stderr (or the exit status when stderr is
/// empty).
pub fn check_output(command: &str, out: &Output) -> Result<String, ProvisionError> {
    if !out.status.success() || !out.stderr.is_empty() {
        return Err(ProvisionError::Transport {
            command: command.to_string(),
            message: failure_message(out),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

fn failure_message(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", out.status)
    } else {
        stderr
    }
}

fn runner_error(e: anyhow::Error, operation: &str) -> ProvisionError {
    match e.downcast_ref::<CommandTimeout>() {
        Some(t) => ProvisionError::TransportTimeout {
            operation: operation.to_string(),
            timeout: t.timeout,
        },
        None => ProvisionError::Transport {
            command: operation.to_string(),
            message: format!("{e:#}"),
        },
    }
}
