//! Protocol-agnostic LoRa data model and airtime/duty-cycle accounting.
//!
//! Shared between the Meshtastic and MeshCore stacks: both talk to the
//! same modem facade, which only understands raw [`LoraPacket`]/
//! [`LoraPacketRx`] values and a flat settings map.

pub mod airtime;
pub mod duty_cycle;
pub mod settings;

/// An outgoing (or protocol-internal) LoRa frame: raw bytes only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoraPacket {
    pub data: Vec<u8>,
}

impl LoraPacket {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// A received LoRa frame, carrying the modem's signal-quality metadata.
/// `snr`/`rssi`/`freq_error` are only meaningful on the RX side; outgoing
/// packets never carry them (see [`LoraPacket`]).
#[derive(Debug, Clone, PartialEq)]
pub struct LoraPacketRx {
    pub data: Vec<u8>,
    /// Signal-to-noise ratio in dB.
    pub snr: f32,
    /// Received signal strength in dBm.
    pub rssi: i32,
    /// Frequency error in Hz.
    pub freq_error: i32,
}

impl LoraPacketRx {
    pub fn as_packet(&self) -> LoraPacket {
        LoraPacket::new(self.data.clone())
    }
}
