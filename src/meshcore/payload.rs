//! MeshCore payload variants: raw fallback, encrypted group text, and
//! signed adverts.

use crate::error::GatewayError;
use crate::meshcore::node::MeshcoreNode;
use aes::Aes128;
use cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertNodeType {
    ChatNode,
    Repeater,
    RoomServer,
    Sensor,
}

impl AdvertNodeType {
    fn from_nibble(value: u8) -> Result<Self, GatewayError> {
        match value {
            1 => Ok(AdvertNodeType::ChatNode),
            2 => Ok(AdvertNodeType::Repeater),
            3 => Ok(AdvertNodeType::RoomServer),
            4 => Ok(AdvertNodeType::Sensor),
            other => Err(GatewayError::decode(format!("unknown advert node type {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PayloadAdvert {
    pub pubkey: [u8; 32],
    pub timestamp: u32,
    pub node_type: AdvertNodeType,
    /// Decoded as (lat, lon) degrees, each a signed fixed-point value
    /// stored on the wire as `degrees * 1_000_000`.
    pub lat_lon: Option<(f64, f64)>,
    pub name: Option<String>,
}

const LATLON_MASK: u8 = 0x10;
const FEAT1_MASK: u8 = 0x20;
const FEAT2_MASK: u8 = 0x40;
const NAME_MASK: u8 = 0x80;

impl PayloadAdvert {
    pub fn deserialize(data: &[u8]) -> Result<Self, GatewayError> {
        if data.len() < 32 + 4 + 64 + 1 {
            return Err(GatewayError::decode("advert payload too short"));
        }
        let mut idx = 0usize;

        let pubkey: [u8; 32] = data[idx..idx + 32].try_into().unwrap();
        idx += 32;

        let timestamp = u32::from_le_bytes(data[idx..idx + 4].try_into().unwrap());
        idx += 4;

        let signature_bytes: [u8; 64] = data[idx..idx + 64].try_into().unwrap();
        idx += 64;

        let flags = data[idx];
        idx += 1;

        let node_type = AdvertNodeType::from_nibble(flags & 0xF)?;

        let lat_lon = if flags & LATLON_MASK != 0 {
            if data.len() < idx + 8 {
                return Err(GatewayError::decode("advert lat/lon truncated"));
            }
            let lat = i32::from_le_bytes(data[idx..idx + 4].try_into().unwrap());
            idx += 4;
            let lon = i32::from_le_bytes(data[idx..idx + 4].try_into().unwrap());
            idx += 4;
            Some((lat as f64 / 1_000_000.0, lon as f64 / 1_000_000.0))
        } else {
            None
        };

        if flags & FEAT1_MASK != 0 {
            idx += 2;
        }
        if flags & FEAT2_MASK != 0 {
            idx += 2;
        }

        let name = if flags & NAME_MASK != 0 {
            Some(
                String::from_utf8(data[idx..].to_vec())
                    .map_err(|e| GatewayError::decode(format!("advert name not utf-8: {e}")))?,
            )
        } else {
            None
        };

        verify_advert_signature(data, &pubkey, &signature_bytes)?;

        Ok(Self { pubkey, timestamp, node_type, lat_lon, name })
    }
}

/// Verifies the advert's signature over the message with the 64
/// signature bytes (at offset `32+4`) spliced out: adverts are signed
/// before the signature itself is inserted into the frame.
fn verify_advert_signature(data: &[u8], pubkey: &[u8; 32], signature: &[u8; 64]) -> Result<(), GatewayError> {
    let sig_start = 32 + 4;
    let sig_end = sig_start + 64;
    let mut data_nokey = Vec::with_capacity(data.len() - 64);
    data_nokey.extend_from_slice(&data[..sig_start]);
    data_nokey.extend_from_slice(&data[sig_end..]);

    let verifying_key = VerifyingKey::from_bytes(pubkey)
        .map_err(|e| GatewayError::crypto(format!("invalid advert pubkey: {e}")))?;
    let signature = Signature::from_bytes(signature);
    verifying_key
        .verify(&data_nokey, &signature)
        .map_err(|e| GatewayError::crypto(format!("advert signature verification failed: {e}")))
}

#[derive(Debug, Clone)]
pub struct PayloadGroupText {
    pub channel_name: String,
    pub timestamp: u32,
    pub sender_name: String,
    pub message: String,
}

impl PayloadGroupText {
    /// Tries every channel key in `node` until one produces a matching
    /// HMAC prefix, then decrypts with that key. Channels are tried in
    /// arbitrary (hash map) order; a matching `channel_hash` byte alone
    /// is not sufficient — the HMAC must also check out, since the
    /// 1-byte hash is a 256-way collision space.
    pub fn deserialize(node: &MeshcoreNode, data: &[u8]) -> Result<Self, GatewayError> {
        if data.len() < 3 {
            return Err(GatewayError::decode("group text payload too short"));
        }
        let channel_hash = data[0];
        let cipher_mac = &data[1..3];
        let ciphertext = &data[3..];

        for (name, key) in node.channels() {
            let sha256_key = Sha256::digest(key);
            if sha256_key[0] != channel_hash {
                continue;
            }

            let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
                .map_err(|e| GatewayError::crypto(format!("bad HMAC key: {e}")))?;
            mac.update(ciphertext);
            if mac.verify_truncated_left(cipher_mac).is_err() {
                log::debug!("mac mismatch for channel '{name}'");
                continue;
            }

            let decrypted = aes_ecb_decrypt(key, ciphertext)?;
            return parse_group_text_plaintext(name.clone(), &decrypted);
        }

        Err(GatewayError::crypto("could not decrypt: no channel key matched"))
    }
}

fn aes_ecb_decrypt(key: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>, GatewayError> {
    if ciphertext.len() % 16 != 0 {
        return Err(GatewayError::decode("ciphertext not a multiple of the AES block size"));
    }
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = ciphertext.to_vec();
    for block in out.chunks_mut(16) {
        let block_arr = GenericArray::from_mut_slice(block);
        cipher.decrypt_block(block_arr);
    }
    Ok(out)
}

fn parse_group_text_plaintext(channel_name: String, decrypted: &[u8]) -> Result<PayloadGroupText, GatewayError> {
    if decrypted.len() < 5 {
        return Err(GatewayError::decode("group text plaintext too short"));
    }
    let timestamp = u32::from_le_bytes(decrypted[0..4].try_into().unwrap());
    // byte 4: attempt_num (bits 0-1), txt_type (bits 2-7) — not currently surfaced.
    let mut text_bytes = &decrypted[5..];
    while text_bytes.last() == Some(&0) {
        text_bytes = &text_bytes[..text_bytes.len() - 1];
    }
    let full_msg = String::from_utf8(text_bytes.to_vec())
        .map_err(|e| GatewayError::decode(format!("group text not utf-8: {e}")))?;
    let mut parts = full_msg.splitn(2, ": ");
    let sender_name = parts
        .next()
        .ok_or_else(|| GatewayError::decode("group text missing sender"))?
        .to_string();
    let message = parts
        .next()
        .ok_or_else(|| GatewayError::decode("group text missing ': ' separator"))?
        .to_string();
    Ok(PayloadGroupText { channel_name, timestamp, sender_name, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_text_plaintext_splits_on_first_colon_space() {
        let mut plain = vec![0u8; 5];
        plain.extend_from_slice(b"alice: hi: there");
        let parsed = parse_group_text_plaintext("#test".to_string(), &plain).unwrap();
        assert_eq!(parsed.sender_name, "alice");
        assert_eq!(parsed.message, "hi: there");
    }

    #[test]
    fn advert_too_short_is_a_decode_error() {
        assert!(PayloadAdvert::deserialize(&[0u8; 10]).is_err());
    }

    /// P6: tampering with any byte outside the 64-byte signature window
    /// flips verification to failure; the window itself is spliced out
    /// of the signed bytes before checking.
    #[test]
    fn tampering_outside_signature_window_breaks_verification() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let verifying_key = signing_key.verifying_key();

        // Minimum-size advert: pubkey(32) + timestamp(4) + signature(64) + flags(1).
        let mut data = vec![0u8; 101];
        data[..32].copy_from_slice(verifying_key.as_bytes());
        data[32..36].copy_from_slice(&1234u32.to_le_bytes());
        data[100] = 1; // ChatNode, no lat/lon, no feature fields, no name

        let mut signed = Vec::new();
        signed.extend_from_slice(&data[..36]);
        signed.extend_from_slice(&data[100..]);
        let signature = signing_key.sign(&signed);
        data[36..100].copy_from_slice(&signature.to_bytes());

        let pubkey: [u8; 32] = data[..32].try_into().unwrap();
        let sig_bytes: [u8; 64] = data[36..100].try_into().unwrap();
        verify_advert_signature(&data, &pubkey, &sig_bytes).unwrap();

        let mut tampered = data.clone();
        tampered[33] ^= 0xFF; // flips a timestamp byte, outside the signature window
        assert!(verify_advert_signature(&tampered, &pubkey, &sig_bytes).is_err());
    }
}
