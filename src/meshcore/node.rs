//! MeshCore channel registry.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// The channel keys a MeshCore node knows about, keyed by name.
#[derive(Debug, Clone)]
pub struct MeshcoreNode {
    channels: HashMap<String, [u8; 16]>,
}

impl MeshcoreNode {
    pub fn new(channels: HashMap<String, [u8; 16]>) -> Self {
        Self { channels }
    }

    /// The three channels a fresh MeshCore install ships with: the
    /// fixed "Public" key, and two hashtag channels whose keys are
    /// derived from their lowercased names.
    pub fn with_default_channels() -> Self {
        let mut channels = HashMap::new();
        channels.insert("Public".to_string(), *b"\x8b\x33\x87\xe9\xc5\xcd\xea\x6a\xc9\xe5\xed\xba\xa1\x15\xcd\x72");
        channels.insert("#test".to_string(), hashtag_key("#test"));
        channels.insert("#ping".to_string(), hashtag_key("#ping"));
        Self::new(channels)
    }

    pub fn channels(&self) -> &HashMap<String, [u8; 16]> {
        &self.channels
    }
}

/// `SHA256(name.lower())[:16]`, the key derivation for hashtag channels
/// that weren't given an explicit key in configuration.
pub fn hashtag_key(name: &str) -> [u8; 16] {
    let digest = Sha256::digest(name.to_lowercase().as_bytes());
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}
