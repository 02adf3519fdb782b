//! Meshtastic channel key derivation: PSK expansion and the channel hash
//! used to pick which configured channel a received packet belongs to.

use crate::constants::MESHTASTIC_DEFAULT_PSK;
use crate::error::GatewayError;
use base64::Engine;

/// A configured Meshtastic channel: its name, derived AES key, and the
/// single-byte hash broadcast in every packet header.
#[derive(Debug, Clone)]
pub struct MeshtasticChannel {
    pub name: String,
    /// Empty means encryption disabled for this channel.
    pub key: Vec<u8>,
    pub hash: u8,
}

impl MeshtasticChannel {
    pub fn new(name: impl Into<String>, psk_base64: &str) -> Result<Self, GatewayError> {
        let name = name.into();
        let key = psk_to_key(psk_base64)?;
        let hash = channel_hash(&name, &key);
        Ok(Self { name, key, hash })
    }
}

/// Expands a base64-encoded PSK into the AES key Meshtastic firmware
/// would actually use, following the special-case rules for
/// single-byte shorthand keys and zero-padded short keys.
///
/// An empty PSK is rejected outright: firmware treats it as "use the
/// primary channel's key", a fallback this gateway does not implement.
/// Callers that want encryption disabled must supply the explicit
/// single zero byte shorthand.
pub fn psk_to_key(psk_base64: &str) -> Result<Vec<u8>, GatewayError> {
    let psk = base64::engine::general_purpose::STANDARD
        .decode(psk_base64)
        .map_err(|e| GatewayError::config(format!("invalid PSK base64: {e}")))?;

    if psk.is_empty() {
        return Err(GatewayError::config(
            "no PSK provided for channel; use a single zero byte to request no encryption",
        ));
    }

    if psk.len() == 1 {
        return if psk[0] == 0 {
            Ok(Vec::new())
        } else {
            let mut key = MESHTASTIC_DEFAULT_PSK;
            key[15] = key[15].wrapping_add(psk[0] - 1);
            Ok(key.to_vec())
        };
    }

    if psk.len() < 16 {
        log::warn!("zero-padding short AES128 key");
        let mut padded = vec![0u8; 16 - psk.len()];
        padded.extend_from_slice(&psk);
        return Ok(padded);
    }

    if psk.len() < 32 && psk.len() != 16 {
        log::warn!("zero-padding short AES256 key");
        let mut padded = vec![0u8; 32 - psk.len()];
        padded.extend_from_slice(&psk);
        return Ok(padded);
    }

    Ok(psk)
}

/// XOR of every byte of `name` (UTF-8) followed by every byte of `key`.
pub fn channel_hash(name: &str, key: &[u8]) -> u8 {
    name.bytes().chain(key.iter().copied()).fold(0u8, |acc, b| acc ^ b)
}
