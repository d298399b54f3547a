//! AmneziaWG key material.

use secrecy::SecretString;

/// A freshly generated peer keypair, both halves base64-encoded.
///
/// The private half is redacted from `Debug` output.
#[derive(Debug)]
pub struct WgKeyPair {
    pub private_key: SecretString,
    pub public_key: String,
}

/// Keys handed to a new peer.
#[derive(Debug)]
pub struct PeerKeys {
    pub keypair: WgKeyPair,
    /// The profile's shared pre-shared key, if it has one.
    pub preshared_key: Option<String>,
}
