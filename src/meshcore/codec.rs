//! MeshCore packet framing: header byte, optional transport codes, path,
//! and payload dispatch.

use crate::constants::{MESHCORE_MAX_PACKET_PAYLOAD, MESHCORE_MAX_PATH_SIZE};
use crate::error::GatewayError;
use crate::meshcore::node::MeshcoreNode;
use crate::meshcore::payload::{PayloadAdvert, PayloadGroupText};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteType {
    TransportFlood,
    Flood,
    Direct,
    TransportDirect,
}

impl RouteType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => RouteType::TransportFlood,
            1 => RouteType::Flood,
            2 => RouteType::Direct,
            _ => RouteType::TransportDirect,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            RouteType::TransportFlood => 0,
            RouteType::Flood => 1,
            RouteType::Direct => 2,
            RouteType::TransportDirect => 3,
        }
    }

    fn carries_transport_codes(self) -> bool {
        matches!(self, RouteType::TransportFlood | RouteType::TransportDirect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Req,
    Response,
    TxtMsg,
    Ack,
    Advert,
    GrpTxt,
    GrpData,
    AnonReq,
    Path,
    Trace,
    Multipart,
    Control,
    /// Collapses raw values `0xC`, `0xD`, and `0xE`, all currently
    /// reserved in the MeshCore wire format.
    Reserved,
    RawCustom,
}

impl PayloadType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0xF {
            0x0 => PayloadType::Req,
            0x1 => PayloadType::Response,
            0x2 => PayloadType::TxtMsg,
            0x3 => PayloadType::Ack,
            0x4 => PayloadType::Advert,
            0x5 => PayloadType::GrpTxt,
            0x6 => PayloadType::GrpData,
            0x7 => PayloadType::AnonReq,
            0x8 => PayloadType::Path,
            0x9 => PayloadType::Trace,
            0xA => PayloadType::Multipart,
            0xB => PayloadType::Control,
            0xC..=0xE => PayloadType::Reserved,
            _ => PayloadType::RawCustom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadVersion {
    V0,
    FutureV1,
    FutureV2,
    FutureV3,
}

impl PayloadVersion {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => PayloadVersion::V0,
            1 => PayloadVersion::FutureV1,
            2 => PayloadVersion::FutureV2,
            _ => PayloadVersion::FutureV3,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Raw(Vec<u8>),
    GroupText(PayloadGroupText),
    Advert(PayloadAdvert),
}

#[derive(Debug, Clone)]
pub struct MeshcorePacket {
    pub route_type: RouteType,
    pub payload_type: PayloadType,
    pub payload_version: PayloadVersion,
    pub transport_codes: Option<(u16, u16)>,
    pub path: Vec<u8>,
    pub payload: Payload,
}

impl MeshcorePacket {
    pub fn deserialize(node: &MeshcoreNode, data: &[u8]) -> Result<Self, GatewayError> {
        if data.is_empty() {
            return Err(GatewayError::decode("empty packet"));
        }
        let mut idx = 0usize;
        let header = data[idx];
        idx += 1;

        let route_type = RouteType::from_bits(header & 0x3);
        let payload_type = PayloadType::from_bits((header >> 2) & 0xF);
        let payload_version = PayloadVersion::from_bits((header >> 6) & 0x3);
        if payload_version != PayloadVersion::V0 {
            return Err(GatewayError::decode("unsupported payload version"));
        }

        let transport_codes = if route_type.carries_transport_codes() {
            if data.len() < idx + 4 {
                return Err(GatewayError::decode("transport codes truncated"));
            }
            let t1 = u16::from_le_bytes(data[idx..idx + 2].try_into().unwrap());
            let t2 = u16::from_le_bytes(data[idx + 2..idx + 4].try_into().unwrap());
            idx += 4;
            Some((t1, t2))
        } else {
            None
        };

        if data.len() <= idx {
            return Err(GatewayError::decode("packet missing path length byte"));
        }
        let path_len = data[idx] as usize;
        idx += 1;
        if path_len > MESHCORE_MAX_PATH_SIZE {
            return Err(GatewayError::decode("MAX_PATH_SIZE exceeded"));
        }
        if data.len() < idx + path_len {
            return Err(GatewayError::decode("path truncated"));
        }
        let path = data[idx..idx + path_len].to_vec();
        idx += path_len;

        let payload_bytes = &data[idx..];
        if payload_bytes.len() > MESHCORE_MAX_PACKET_PAYLOAD {
            return Err(GatewayError::decode("MAX_PACKET_PAYLOAD exceeded"));
        }

        let payload = decode_payload(node, payload_type, payload_bytes);

        Ok(Self { route_type, payload_type, payload_version, transport_codes, path, payload })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let header = self.route_type.to_bits()
            | ((payload_type_bits(self.payload_type)) << 2)
            | (0u8 << 6); // always serialize as V0
        out.push(header);
        if let Some((t1, t2)) = self.transport_codes {
            out.extend_from_slice(&t1.to_le_bytes());
            out.extend_from_slice(&t2.to_le_bytes());
        }
        out.push(self.path.len() as u8);
        out.extend_from_slice(&self.path);
        out.extend_from_slice(&self.payload_bytes());
        out
    }

    fn payload_bytes(&self) -> Vec<u8> {
        match &self.payload {
            Payload::Raw(bytes) => bytes.clone(),
            // Group text and advert payloads are never reconstructed by
            // this gateway; it only ever re-transmits the original raw
            // frame (see `meshcore::engine`), never a parsed-then-rebuilt one.
            Payload::GroupText(_) | Payload::Advert(_) => Vec::new(),
        }
    }
}

fn payload_type_bits(t: PayloadType) -> u8 {
    match t {
        PayloadType::Req => 0x0,
        PayloadType::Response => 0x1,
        PayloadType::TxtMsg => 0x2,
        PayloadType::Ack => 0x3,
        PayloadType::Advert => 0x4,
        PayloadType::GrpTxt => 0x5,
        PayloadType::GrpData => 0x6,
        PayloadType::AnonReq => 0x7,
        PayloadType::Path => 0x8,
        PayloadType::Trace => 0x9,
        PayloadType::Multipart => 0xA,
        PayloadType::Control => 0xB,
        PayloadType::Reserved => 0xC,
        PayloadType::RawCustom => 0xF,
    }
}

/// Deserialization never fails here: unknown or malformed payloads fall
/// back to [`Payload::Raw`] with the original bytes, logged at warn.
fn decode_payload(node: &MeshcoreNode, payload_type: PayloadType, bytes: &[u8]) -> Payload {
    let result = match payload_type {
        PayloadType::Advert => PayloadAdvert::deserialize(bytes).map(Payload::Advert),
        PayloadType::GrpTxt => PayloadGroupText::deserialize(node, bytes).map(Payload::GroupText),
        _ => return Payload::Raw(bytes.to_vec()),
    };
    result.unwrap_or_else(|e| {
        log::warn!("error deserializing {payload_type:?} payload: {e}");
        Payload::Raw(bytes.to_vec())
    })
}
