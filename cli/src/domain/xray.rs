//! Xray `server.json` client list and VLESS link template.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::{Value, json};

use crate::domain::error::DocumentError;
use crate::domain::ledger::pretty_json;

/// Flow tag every client entry must carry.
pub const VISION_FLOW: &str = "xtls-rprx-vision";

/// Port the REALITY inbound listens on.
pub const VLESS_PORT: u16 = 443;

/// REALITY camouflage parameters baked into every deployment. Client apps
/// reject links whose values differ from the server's inbound.
pub const REALITY_SNI: &str = "www.googletagmanager.com";
pub const REALITY_FINGERPRINT: &str = "chrome";
pub const REALITY_SHORT_ID: &str = "8a48dd5300642057";

const CLIENTS_POINTER: &str = "/inbounds/0/settings/clients";

/// Characters escaped in the link's `#name` fragment.
const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`').add(b'#');

/// Parsed `server.json`. Key order of the original document is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct XrayConfig {
    doc: Value,
}

impl XrayConfig {
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or has no
    /// `inbounds[0].settings.clients` array.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let doc: Value = serde_json::from_str(text)?;
        if !doc.pointer(CLIENTS_POINTER).is_some_and(Value::is_array) {
            return Err(DocumentError::MissingField("inbounds[0].settings.clients"));
        }
        Ok(Self { doc })
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String, DocumentError> {
        pretty_json(&self.doc)
    }

    fn clients(&self) -> &[Value] {
        self.doc
            .pointer(CLIENTS_POINTER)
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    fn clients_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.doc
            .pointer_mut(CLIENTS_POINTER)
            .and_then(Value::as_array_mut)
    }

    /// Ids of the clients the server currently accepts, in file order.
    #[must_use]
    pub fn client_ids(&self) -> Vec<&str> {
        self.clients()
            .iter()
            .filter_map(|c| c.get("id").and_then(Value::as_str))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.client_ids().contains(&client_id)
    }

    /// Appends `{id, email, flow, level}` unless `client_id` is already
    /// present. Returns whether the list changed.
    pub fn add_client(&mut self, client_id: &str, email: &str) -> bool {
        if self.contains(client_id) {
            return false;
        }
        let entry = json!({
            "id": client_id,
            "email": email,
            "flow": VISION_FLOW,
            "level": 0,
        });
        match self.clients_mut() {
            Some(clients) => {
                clients.push(entry);
                true
            }
            None => false,
        }
    }

    /// Drops every entry for `client_id`. Returns whether the list changed.
    pub fn remove_client(&mut self, client_id: &str) -> bool {
        let Some(clients) = self.clients_mut() else {
            return false;
        };
        let before = clients.len();
        clients.retain(|c| c.get("id").and_then(Value::as_str) != Some(client_id));
        clients.len() != before
    }
}

/// Inputs substituted into the VLESS link template.
pub struct VlessLink<'a> {
    pub client_id: &'a str,
    pub host: &'a str,
    pub public_key: &'a str,
    pub client_name: &'a str,
}

impl VlessLink<'_> {
    #[must_use]
    pub fn to_url(&self) -> String {
        format!(
            "vless://{id}@{host}:{VLESS_PORT}?encryption=none&security=reality&type=tcp\
             &flow={VISION_FLOW}&fp={REALITY_FINGERPRINT}&pbk={pbk}\
             &sni={REALITY_SNI}&sid={REALITY_SHORT_ID}#{name}",
            id = self.client_id,
            host = self.host,
            pbk = self.public_key,
            name = utf8_percent_encode(self.client_name, FRAGMENT),
        )
    }
}
