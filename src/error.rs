//! # Gateway Error Handling
//!
//! Defines the [`GatewayError`] enum shared by the modem transport, both
//! protocol codecs, and both protocol engines. Error kinds mirror the
//! taxonomy this gateway distinguishes: transport failures recover
//! locally, decode/crypto failures drop or fall back to a raw
//! representation, and config errors are surfaced to the caller at
//! `start()`.

use thiserror::Error;

/// Represents the different error types that can occur in the gateway crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// I/O failure on the modem transport: the socket/port is gone.
    /// Recovered locally by the reader loop (sleep + reconnect); never
    /// propagated to a caller that isn't the transport itself.
    #[error("modem transport error: {0}")]
    Transport(String),

    /// Packet too short, unsupported version, a size limit (path/payload)
    /// exceeded while decoding a radio packet, or a line from the modem
    /// that didn't parse as JSON. The connection itself is still healthy;
    /// the offending line/packet is dropped and logged.
    #[error("packet decode error: {0}")]
    Decode(String),

    /// MAC mismatch, signature verification failure, or decryption failure.
    /// Callers fall back to a raw/undecoded representation rather than
    /// propagating this further.
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Malformed PSK, wrong-length MeshCore channel key, or an invalid LoRa
    /// parameter range. Surfaced to the caller at `start()`; the engine
    /// refuses to start.
    #[error("configuration error: {0}")]
    Config(String),

    /// A LoRa parameter required for airtime accounting was not set before
    /// a TX/RX. Logged; the packet is still forwarded, only the duty-cycle
    /// metric is skipped.
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// Catch-all for uncategorized cases.
    #[error("other error: {0}")]
    Other(String),
}

impl GatewayError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}
