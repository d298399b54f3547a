//! The `clientsTable` ledger: metadata about issued clients, kept next to
//! the live config on the server.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::DocumentError;

/// Remote file name of the ledger inside the protocol's config directory.
pub const LEDGER_FILENAME: &str = "clientsTable";

/// One ledger row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub client_id: String,
    pub user_data: UserData,
}

/// Metadata attached to a ledger row. Unknown keys written by other tools
/// are carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_ips: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_received: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_sent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_handshake: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LedgerEntry {
    /// Entry for an Xray client.
    #[must_use]
    pub fn tls_client(client_id: &str, client_name: &str, created: DateTime<Utc>) -> Self {
        Self {
            client_id: client_id.to_string(),
            user_data: UserData {
                client_name: client_name.to_string(),
                creation_date: creation_date(created),
                ..UserData::default()
            },
        }
    }

    /// Entry for an AmneziaWG peer, with zeroed traffic counters.
    #[must_use]
    pub fn wg_peer(
        client_id: &str,
        client_name: &str,
        allowed_ips: &str,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            user_data: UserData {
                client_name: client_name.to_string(),
                creation_date: creation_date(created),
                allowed_ips: Some(allowed_ips.to_string()),
                data_received: Some("0 B".to_string()),
                data_sent: Some("0 B".to_string()),
                latest_handshake: Some(String::new()),
                extra: Map::new(),
            },
        }
    }
}

/// Ordered list of ledger entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Parse the ledger file. An empty file is an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a JSON array of entries.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries = serde_json::from_str(text)?;
        Ok(Self { entries })
    }

    /// Serialize with four-space indentation, the layout the server writes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String, DocumentError> {
        pretty_json(&self.entries)
    }

    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn find(&self, client_id: &str) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.client_id == client_id)
    }

    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.find(client_id).is_some()
    }

    pub fn push(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// Drops every entry for `client_id`; returns whether any was removed.
    pub fn remove(&mut self, client_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.client_id != client_id);
        self.entries.len() != before
    }
}

/// Timestamp format used in `creationDate`, e.g. `Tue Mar 04 10:15:00 2025`.
#[must_use]
pub fn creation_date(at: DateTime<Utc>) -> String {
    at.format("%a %b %d %H:%M:%S %Y").to_string()
}

/// Client name shown in the ledger and in client apps: the caller's display
/// name suffixed with the issue time, so repeated issues never collide.
#[must_use]
pub fn composite_client_name(display_name: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", display_name.trim(), at.format("%Y-%m-%d_%H%M%S"))
}

pub(crate) fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, DocumentError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
