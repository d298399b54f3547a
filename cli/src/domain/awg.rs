//! AmneziaWG `wg0.conf` model and client config rendering.
//!
//! The document is kept as raw lines grouped into sections so comments,
//! ordering and unknown keys survive a rewrite. A disabled peer stays in the
//! file with every non-blank line prefixed by `#! `.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use crate::domain::error::DocumentError;

/// Interface keys holding the junk-packet/padding obfuscation parameters.
/// Clients must use the server's exact values.
pub const OBFUSCATION_KEYS: [&str; 9] = ["Jc", "Jmin", "Jmax", "S1", "S2", "H1", "H2", "H3", "H4"];

pub const CLIENT_DNS: &str = "1.1.1.1, 1.0.0.1";
pub const CLIENT_ALLOWED_IPS: &str = "0.0.0.0/0,::/0";
pub const ENDPOINT_PORT: u16 = 46446;
pub const PERSISTENT_KEEPALIVE: u16 = 25;

const DISABLED_PREFIX: &str = "#! ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Interface,
    Peer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    kind: SectionKind,
    /// Header first, then body lines, without the disabled prefix.
    lines: Vec<String>,
    enabled: bool,
}

impl Section {
    fn attr(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .skip(1)
            .filter_map(|l| parse_attr(l))
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    fn public_key(&self) -> Option<&str> {
        self.attr("PublicKey")
    }

    fn ends_with_blank(&self) -> bool {
        self.lines.last().is_some_and(|l| l.trim().is_empty())
    }
}

/// Read-only view of one `[Peer]` section.
#[derive(Debug, Clone, Copy)]
pub struct Peer<'a> {
    section: &'a Section,
}

impl<'a> Peer<'a> {
    #[must_use]
    pub fn public_key(&self) -> &'a str {
        self.section.public_key().unwrap_or_default()
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&'a str> {
        self.section.attr(key)
    }

    #[must_use]
    pub fn allowed_ips(&self) -> &'a str {
        self.attr("AllowedIPs").unwrap_or_default()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.section.enabled
    }
}

/// Parsed `wg0.conf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwgConfig {
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl AwgConfig {
    /// # Errors
    ///
    /// Returns an error on an unknown section header, or a `[Peer]` without
    /// a `PublicKey`.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut cfg = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let (disabled, line) = match raw.strip_prefix(DISABLED_PREFIX) {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let trimmed = line.trim();
            if trimmed.starts_with('[') {
                let kind = match trimmed {
                    "[Interface]" => SectionKind::Interface,
                    "[Peer]" => SectionKind::Peer,
                    other => {
                        return Err(DocumentError::Syntax {
                            line: idx + 1,
                            message: format!("unknown section {other}"),
                        });
                    }
                };
                cfg.sections.push(Section {
                    kind,
                    lines: vec![trimmed.to_string()],
                    enabled: !disabled,
                });
                continue;
            }
            match cfg.sections.last_mut() {
                // The prefix only marks lines of a disabled section.
                Some(section) if !section.enabled => section.lines.push(line.to_string()),
                Some(section) => section.lines.push(raw.to_string()),
                None => cfg.preamble.push(raw.to_string()),
            }
        }
        if let Some(pos) = cfg
            .sections
            .iter()
            .position(|s| s.kind == SectionKind::Peer && s.public_key().is_none())
        {
            return Err(DocumentError::Syntax {
                line: cfg.line_of_section(pos),
                message: "[Peer] without PublicKey".to_string(),
            });
        }
        Ok(cfg)
    }

    fn line_of_section(&self, index: usize) -> usize {
        self.preamble.len()
            + self.sections[..index]
                .iter()
                .map(|s| s.lines.len())
                .sum::<usize>()
            + 1
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }
        for section in &self.sections {
            for line in &section.lines {
                if !section.enabled && !line.trim().is_empty() {
                    out.push_str(DISABLED_PREFIX);
                }
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    /// Value of `key` in the `[Interface]` section.
    #[must_use]
    pub fn interface_attr(&self, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.kind == SectionKind::Interface)
            .and_then(|s| s.attr(key))
    }

    /// Every peer, enabled or disabled, in file order.
    pub fn peers(&self) -> impl Iterator<Item = Peer<'_>> {
        self.sections
            .iter()
            .filter(|s| s.kind == SectionKind::Peer)
            .map(|section| Peer { section })
    }

    #[must_use]
    pub fn peer(&self, public_key: &str) -> Option<Peer<'_>> {
        self.peers().find(|p| p.public_key() == public_key)
    }

    fn peer_index(&self, public_key: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.kind == SectionKind::Peer && s.public_key() == Some(public_key))
    }

    /// Appends an enabled `[Peer]` with the given attributes after
    /// `PublicKey`. Returns `false` if the key already exists.
    pub fn add_peer(&mut self, public_key: &str, attrs: &[(&str, &str)]) -> bool {
        if self.peer_index(public_key).is_some() {
            return false;
        }
        match self.sections.last_mut() {
            Some(last) if !last.ends_with_blank() => last.lines.push(String::new()),
            None if self.preamble.last().is_some_and(|l| !l.trim().is_empty()) => {
                self.preamble.push(String::new());
            }
            _ => {}
        }
        let mut lines = vec!["[Peer]".to_string(), format!("PublicKey = {public_key}")];
        lines.extend(attrs.iter().map(|(k, v)| format!("{k} = {v}")));
        self.sections.push(Section {
            kind: SectionKind::Peer,
            lines,
            enabled: true,
        });
        true
    }

    /// Deletes the peer section. Returns whether it existed.
    pub fn remove_peer(&mut self, public_key: &str) -> bool {
        match self.peer_index(public_key) {
            Some(idx) => {
                self.sections.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Enables or disables a peer. `None` if the peer does not exist,
    /// otherwise whether anything changed.
    pub fn set_peer_enabled(&mut self, public_key: &str, enabled: bool) -> Option<bool> {
        let idx = self.peer_index(public_key)?;
        let section = &mut self.sections[idx];
        let changed = section.enabled != enabled;
        section.enabled = enabled;
        Some(changed)
    }
}

fn parse_attr(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Everything that goes into a client's standalone config.
pub struct ClientConfig<'a> {
    pub address: &'a str,
    pub private_key: &'a str,
    pub preshared_key: Option<&'a str>,
    pub server_public_key: &'a str,
    pub endpoint_host: &'a str,
    /// `(key, value)` pairs copied from the server's `[Interface]`.
    pub obfuscation: Vec<(&'a str, &'a str)>,
}

impl ClientConfig<'_> {
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("[Interface]\n");
        push_attr(&mut out, "Address", self.address);
        push_attr(&mut out, "DNS", CLIENT_DNS);
        push_attr(&mut out, "PrivateKey", self.private_key);
        for (key, value) in &self.obfuscation {
            push_attr(&mut out, key, value);
        }
        out.push_str("\n[Peer]\n");
        push_attr(&mut out, "PublicKey", self.server_public_key);
        if let Some(psk) = self.preshared_key {
            push_attr(&mut out, "PresharedKey", psk);
        }
        push_attr(&mut out, "AllowedIPs", CLIENT_ALLOWED_IPS);
        push_attr(
            &mut out,
            "Endpoint",
            &format!("{}:{ENDPOINT_PORT}", self.endpoint_host),
        );
        push_attr(&mut out, "PersistentKeepalive", &PERSISTENT_KEEPALIVE.to_string());
        out
    }
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(" = ");
    out.push_str(value);
    out.push('\n');
}

/// The server's obfuscation values, in [`OBFUSCATION_KEYS`] order.
///
/// # Errors
///
/// Returns the first key missing from the `[Interface]` section.
pub fn obfuscation_params(cfg: &AwgConfig) -> Result<Vec<(&'static str, &str)>, &'static str> {
    OBFUSCATION_KEYS
        .iter()
        .map(|&key| cfg.interface_attr(key).map(|v| (key, v)).ok_or(key))
        .collect()
}
