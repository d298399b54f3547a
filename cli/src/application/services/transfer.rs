//! Application service: moving files between local scratch and the server.
//!
//! Volume-mounted files are transferred directly. Files that only exist
//! inside a container are staged through a unique host path with
//! `sudo docker cp`, and the staging copy is shredded whatever happens.

use std::path::Path;

use uuid::Uuid;
use vpnctl_common::FileAccess;

use crate::application::ports::RemoteTransport;
use crate::domain::ProvisionError;
use crate::domain::shell::quote;

/// Copy the remote file at `remote` into `local`.
///
/// # Errors
///
/// Returns `FileSync` when the file cannot be read or copied out of the
/// container, `Transport` when the connection fails.
pub async fn pull(
    transport: &impl RemoteTransport,
    access: FileAccess<'_>,
    remote: &str,
    local: &Path,
) -> Result<(), ProvisionError> {
    match access {
        FileAccess::Direct => transport.fetch(remote, local).await,
        FileAccess::Container(container) => {
            let staging = staging_path(remote);
            tracing::debug!(%container, %remote, %staging, "copying out of container");
            let result = async {
                docker_cp(transport, &format!("{container}:{remote}"), &staging, remote).await?;
                transport.fetch(&staging, local).await
            }
            .await;
            with_shred(transport, &staging, result).await
        }
    }
}

/// Replace the remote file at `remote` with `local`.
///
/// # Errors
///
/// Returns `FileSync` when the file cannot be written or copied into the
/// container, `Transport` when the connection fails.
pub async fn push(
    transport: &impl RemoteTransport,
    access: FileAccess<'_>,
    local: &Path,
    remote: &str,
) -> Result<(), ProvisionError> {
    match access {
        FileAccess::Direct => transport.push(local, remote).await,
        FileAccess::Container(container) => {
            let staging = staging_path(remote);
            tracing::debug!(%container, %remote, %staging, "copying into container");
            let result = async {
                transport.push(local, &staging).await?;
                docker_cp(transport, &staging, &format!("{container}:{remote}"), remote).await
            }
            .await;
            with_shred(transport, &staging, result).await
        }
    }
}

/// Host path for staging `remote`, unique per call.
#[must_use]
pub fn staging_path(remote: &str) -> String {
    let name = remote.rsplit('/').next().unwrap_or(remote);
    format!("/tmp/vpnctl-{}-{name}", Uuid::new_v4().simple())
}

async fn docker_cp(
    transport: &impl RemoteTransport,
    from: &str,
    to: &str,
    remote: &str,
) -> Result<(), ProvisionError> {
    let command = format!("sudo docker cp {} {}", quote(from), quote(to));
    match transport.exec(&command).await {
        Ok(_) => Ok(()),
        Err(ProvisionError::Transport { message, .. }) => {
            Err(ProvisionError::file_sync(remote, message))
        }
        Err(e) => Err(e),
    }
}

async fn with_shred(
    transport: &impl RemoteTransport,
    staging: &str,
    result: Result<(), ProvisionError>,
) -> Result<(), ProvisionError> {
    let path = quote(staging);
    let shred = transport
        .exec(&format!("if [ -e {path} ]; then sudo shred -u {path}; fi"))
        .await
        .map(|_| ());
    match (result, shred) {
        (Ok(()), shred) => shred,
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(s)) => Err(e.chain(s)),
    }
}
