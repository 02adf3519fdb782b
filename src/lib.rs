//! # lora-mesh-gateway — a dual-protocol LoRa mesh gateway
//!
//! This crate decodes and relays two coexisting LoRa mesh protocols —
//! a Meshtastic-compatible stack and a MeshCore-compatible stack — on
//! top of an external LoRa modem reached over a line-delimited JSON
//! transport (TCP or serial). It maintains the relay/dedup state
//! required to behave as a well-mannered repeater, answers a small set
//! of application-level requests (ping→pong, traceroute participation),
//! and emits decoded packets upward for an external collaborator to
//! persist or expose.
//!
//! ## Scope
//!
//! The core of this crate is the protocol layer: Meshtastic packet
//! codec + relay/ping logic + channel key derivation and AES-CTR
//! framing; MeshCore packet codec + channel decryption + Ed25519-signed
//! advert handling + RSSI-gated repeater policy; and the modem
//! abstraction that serializes settings/TX and deserializes RX over a
//! reconnecting JSON line transport, with LoRa airtime computation and
//! duty-cycle accounting.
//!
//! Persistence, an HTTP API, process lifecycle, and full configuration
//! loading are deliberately left to an external supervisor — see
//! [`supervisor`].
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! lora-mesh-gateway = "0.1.0"
//! ```

pub mod config;
pub mod constants;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod lora;
pub mod meshcore;
pub mod meshtastic;
pub mod modem;
pub mod supervisor;

pub use crate::error::GatewayError;
pub use crate::logging::{init_logger, log_info};

pub use lora::{LoraPacket, LoraPacketRx};
pub use modem::Modem;
pub use supervisor::{MeshcoreSupervisor, MeshtasticSupervisor};
