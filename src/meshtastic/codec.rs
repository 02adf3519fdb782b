//! Meshtastic packet header framing and channel payload encryption.
//!
//! Header layout (`<IIIBBBB` in the reference implementation, 16 bytes,
//! little-endian): `destination`, `sender`, `packet_id` (u32 each),
//! then a flags byte (`hop_limit` in bits 0-2, `want_ack` in bit 3,
//! `via_mqtt` in bit 4, `hop_start` in bits 5-7), then `channel_hash`,
//! `next_hop`, `relay_node` (u8 each). Everything after the header is
//! the AES-CTR encrypted inner `Data` protobuf message.

use crate::error::GatewayError;
use crate::meshtastic::channel::MeshtasticChannel;
use crate::meshtastic::proto::Data;
use aes::{Aes128, Aes256};
use cipher::{KeyIvInit, StreamCipher};
use prost::Message;

pub const HEADER_LEN: usize = 16;

type Aes128Ctr = ctr::Ctr128LE<Aes128>;
type Aes256Ctr = ctr::Ctr128LE<Aes256>;

/// A Meshtastic mesh packet, header fields plus an (encrypted or
/// plaintext, depending on channel) payload.
#[derive(Debug, Clone)]
pub struct MeshtasticPacket {
    pub destination: u32,
    pub sender: u32,
    pub packet_id: u32,
    pub hop_limit: u8,
    pub want_ack: bool,
    pub via_mqtt: bool,
    pub hop_start: u8,
    pub channel_hash: u8,
    pub next_hop: u8,
    pub relay_node: u8,
    /// Raw ciphertext (or plaintext, on an unencrypted channel) bytes
    /// following the header.
    pub payload_wire: Vec<u8>,
    /// Populated once the payload has been decrypted and parsed.
    pub payload: Option<Data>,
}

impl MeshtasticPacket {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload_wire.len());
        out.extend_from_slice(&self.destination.to_le_bytes());
        out.extend_from_slice(&self.sender.to_le_bytes());
        out.extend_from_slice(&self.packet_id.to_le_bytes());
        let flags = (self.hop_limit & 0x7)
            | ((self.want_ack as u8) << 3)
            | ((self.via_mqtt as u8) << 4)
            | ((self.hop_start & 0x7) << 5);
        out.push(flags);
        out.push(self.channel_hash);
        out.push(self.next_hop);
        out.push(self.relay_node);
        out.extend_from_slice(&self.payload_wire);
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, GatewayError> {
        if data.len() < HEADER_LEN {
            return Err(GatewayError::decode("packet shorter than header"));
        }
        let destination = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let sender = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let packet_id = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let flags = data[12];
        let channel_hash = data[13];
        let next_hop = data[14];
        let relay_node = data[15];
        Ok(Self {
            destination,
            sender,
            packet_id,
            hop_limit: flags & 0x7,
            want_ack: (flags >> 3) & 0x1 != 0,
            via_mqtt: (flags >> 4) & 0x1 != 0,
            hop_start: (flags >> 5) & 0x7,
            channel_hash,
            next_hop,
            relay_node,
            payload_wire: data[HEADER_LEN..].to_vec(),
            payload: None,
        })
    }
}

/// Derives the AES-CTR nonce: packet ID in the low 32 bits, sender node
/// ID at bit offset 64, all other bits zero.
fn nonce_for(packet_id: u32, sender: u32) -> [u8; 16] {
    let mut nonce = [0u8; 16];
    nonce[0..4].copy_from_slice(&packet_id.to_le_bytes());
    nonce[8..12].copy_from_slice(&sender.to_le_bytes());
    nonce
}

/// Encrypts `plaintext` in place for transmission on `channel`. A
/// channel with an empty key (encryption disabled) returns the
/// plaintext unchanged. `psk_to_key` hands back either a 16-byte
/// (AES-128) or 32-byte (AES-256) key depending on the configured PSK's
/// length, so both ciphers need to be supported here.
pub fn encrypt_payload(
    channel: &MeshtasticChannel,
    packet_id: u32,
    sender: u32,
    mut plaintext: Vec<u8>,
) -> Result<Vec<u8>, GatewayError> {
    if channel.key.is_empty() {
        return Ok(plaintext);
    }
    let nonce = nonce_for(packet_id, sender);
    match channel.key.len() {
        16 => {
            let key: [u8; 16] = channel.key.as_slice().try_into().unwrap();
            let mut cipher = Aes128Ctr::new(&key.into(), &nonce.into());
            cipher.apply_keystream(&mut plaintext);
        }
        32 => {
            let key: [u8; 32] = channel.key.as_slice().try_into().unwrap();
            let mut cipher = Aes256Ctr::new(&key.into(), &nonce.into());
            cipher.apply_keystream(&mut plaintext);
        }
        n => return Err(GatewayError::crypto(format!("channel key must be 16 or 32 bytes, got {n}"))),
    }
    Ok(plaintext)
}

/// AES-CTR is its own inverse; decryption is encryption with the same
/// keystream.
pub fn decrypt_payload(
    channel: &MeshtasticChannel,
    packet_id: u32,
    sender: u32,
    ciphertext: Vec<u8>,
) -> Result<Vec<u8>, GatewayError> {
    encrypt_payload(channel, packet_id, sender, ciphertext)
}

/// Decrypts and parses a packet's payload against the channel its
/// `channel_hash` selects.
pub fn decode_packet_payload(
    packet: &mut MeshtasticPacket,
    channel: &MeshtasticChannel,
) -> Result<(), GatewayError> {
    let decrypted = decrypt_payload(
        channel,
        packet.packet_id,
        packet.sender,
        packet.payload_wire.clone(),
    )?;
    if decrypted.is_empty() {
        return Ok(());
    }
    let data = Data::decode(decrypted.as_slice())
        .map_err(|e| GatewayError::decode(format!("inner Data protobuf: {e}")))?;
    packet.payload = Some(data);
    Ok(())
}

/// Serializes `payload` and encrypts it for transmission, producing the
/// bytes to place after the header.
pub fn encode_packet_payload(
    payload: &Data,
    channel: &MeshtasticChannel,
    packet_id: u32,
    sender: u32,
) -> Result<Vec<u8>, GatewayError> {
    let plaintext = payload.encode_to_vec();
    encrypt_payload(channel, packet_id, sender, plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_channel() -> MeshtasticChannel {
        MeshtasticChannel::new("LongFast", "AQ==").unwrap()
    }

    #[test]
    fn header_round_trips() {
        let packet = MeshtasticPacket {
            destination: 0xFFFF_FFFF,
            sender: 42,
            packet_id: 7,
            hop_limit: 3,
            want_ack: true,
            via_mqtt: false,
            hop_start: 5,
            channel_hash: 0x12,
            next_hop: 0,
            relay_node: 0,
            payload_wire: vec![1, 2, 3],
            payload: None,
        };
        let bytes = packet.to_bytes();
        let parsed = MeshtasticPacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.destination, packet.destination);
        assert_eq!(parsed.sender, packet.sender);
        assert_eq!(parsed.hop_limit, 3);
        assert!(parsed.want_ack);
        assert!(!parsed.via_mqtt);
        assert_eq!(parsed.hop_start, 5);
        assert_eq!(parsed.payload_wire, vec![1, 2, 3]);
    }

    #[test]
    fn encrypt_then_decrypt_recovers_plaintext() {
        let channel = test_channel();
        let plaintext = b"hello mesh".to_vec();
        let ciphertext = encrypt_payload(&channel, 100, 200, plaintext.clone()).unwrap();
        assert_ne!(ciphertext, plaintext);
        let recovered = decrypt_payload(&channel, 100, 200, ciphertext).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn encrypt_then_decrypt_recovers_plaintext_with_aes256_key() {
        // A 32-byte-decoded PSK selects AES-256 rather than AES-128.
        let psk = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [7u8; 32]);
        let channel = MeshtasticChannel::new("LongFast", &psk).unwrap();
        assert_eq!(channel.key.len(), 32);
        let plaintext = b"hello mesh, but bigger key".to_vec();
        let ciphertext = encrypt_payload(&channel, 100, 200, plaintext.clone()).unwrap();
        assert_ne!(ciphertext, plaintext);
        let recovered = decrypt_payload(&channel, 100, 200, ciphertext).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn disabled_channel_passes_through() {
        let channel = MeshtasticChannel::new("open", "AA==").unwrap();
        assert!(channel.key.is_empty());
        let plaintext = b"plain".to_vec();
        let out = encrypt_payload(&channel, 1, 1, plaintext.clone()).unwrap();
        assert_eq!(out, plaintext);
    }
}
