//! X25519 key generation for AmneziaWG peers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand_core::OsRng;
use secrecy::SecretString;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::application::ports::KeyGenerator;
use crate::domain::WgKeyPair;

/// Generates keys from the OS random source, encoded like `wg genkey`.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519Keys;

impl KeyGenerator for X25519Keys {
    fn generate(&self) -> WgKeyPair {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        WgKeyPair {
            private_key: SecretString::from(STANDARD.encode(secret.to_bytes())),
            public_key: STANDARD.encode(public.as_bytes()),
        }
    }
}
