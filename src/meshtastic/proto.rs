//! Minimal mirror of the inner Meshtastic `Data`/`RouteDiscovery`
//! protobuf messages (see the `meshtastic/mesh.proto` and
//! `meshtastic/portnums.proto` schemas). Only the fields this gateway
//! actually reads or writes are declared; unknown fields still
//! round-trip because `prost` preserves them as part of normal decoding
//! of the fields present, but anything this struct doesn't declare is
//! silently dropped on re-encode. That's acceptable here: the gateway
//! only ever re-serializes packets it built itself (pong replies,
//! traceroute augmentation), never a verbatim relay of a foreign
//! payload it didn't fully understand.

use prost::Message;

/// A subset of `meshtastic.PortNum`. Unrecognized port numbers pass
/// through the codec as their raw integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortNum {
    TextMessageApp,
    TracerouteApp,
    Other(i32),
}

impl PortNum {
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => PortNum::TextMessageApp,
            70 => PortNum::TracerouteApp,
            other => PortNum::Other(other),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            PortNum::TextMessageApp => 1,
            PortNum::TracerouteApp => 70,
            PortNum::Other(v) => v,
        }
    }
}

/// The decrypted inner payload of a Meshtastic packet.
#[derive(Clone, PartialEq, Message)]
pub struct Data {
    #[prost(int32, tag = "1")]
    pub portnum: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub want_response: bool,
    #[prost(uint32, tag = "4")]
    pub dest: u32,
    #[prost(uint32, tag = "5")]
    pub source: u32,
    #[prost(uint32, tag = "6")]
    pub request_id: u32,
    #[prost(uint32, tag = "7")]
    pub reply_id: u32,
    #[prost(uint32, tag = "8")]
    pub emoji: u32,
    #[prost(uint32, tag = "9")]
    pub bitfield: u32,
}

/// The traceroute payload: the hop list accumulated on the way to the
/// destination, and the corresponding list on the way back.
#[derive(Clone, PartialEq, Message)]
pub struct RouteDiscovery {
    #[prost(fixed32, repeated, tag = "1")]
    pub route: Vec<u32>,
    #[prost(int32, repeated, tag = "2")]
    pub snr_towards: Vec<i32>,
    #[prost(fixed32, repeated, tag = "3")]
    pub route_back: Vec<u32>,
    #[prost(int32, repeated, tag = "4")]
    pub snr_back: Vec<i32>,
}

/// Marker value firmware uses for "unknown node" in a route list.
pub const ROUTE_UNKNOWN_NODE: u32 = 0xFFFF_FFFF;
/// Marker value firmware uses for "unknown node" in an SNR list: the
/// minimum representable 8-bit two's complement value.
pub const SNR_UNKNOWN_NODE: i32 = -128;
