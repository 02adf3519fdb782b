//! Gateway-wide protocol constants.

/// Meshtastic header size in bytes (little-endian, packed).
pub const MESHTASTIC_HEADER_LEN: usize = 16;

/// Meshtastic LoRa syncword byte.
pub const MESHTASTIC_SYNCWORD: u8 = 0x2b;

/// Meshtastic well-known default PSK, used to expand single-byte PSK
/// shorthand values. See `meshtastic::channel::psk_to_key`.
pub const MESHTASTIC_DEFAULT_PSK: [u8; 16] = [
    0xd4, 0xf1, 0xbb, 0x3a, 0x20, 0x29, 0x07, 0x59, 0xf0, 0xbc, 0xff, 0xab, 0xcf, 0x4e, 0x69, 0x01,
];

/// MeshCore LoRa syncword byte (RADIOLIB_SX126X_SYNC_WORD_PRIVATE).
pub const MESHCORE_SYNCWORD: u8 = 0x12;

/// Maximum number of node-hash bytes in a MeshCore packet's path.
pub const MESHCORE_MAX_PATH_SIZE: usize = 64;

/// Maximum MeshCore payload size in bytes.
pub const MESHCORE_MAX_PACKET_PAYLOAD: usize = 184;

/// RSSI threshold (dBm) above which the MeshCore engine treats a received
/// packet as "nearby" and repeats it at full power.
pub const MESHCORE_NEARBY_RSSI_DBM: i32 = -80;

/// Maximum LoRa payload size in bytes (modem wire format).
pub const MAX_LORA_PAYLOAD: usize = 255;
