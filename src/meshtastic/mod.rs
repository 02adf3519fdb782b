//! Meshtastic-compatible protocol stack: channel crypto, packet codec,
//! and the relay/ping/traceroute engine.

pub mod channel;
pub mod codec;
pub mod engine;
pub mod proto;

pub use channel::MeshtasticChannel;
pub use engine::MeshtasticEngine;
