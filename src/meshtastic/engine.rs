//! The Meshtastic protocol engine: channel registry, packet ingestion,
//! naive relay, ping responder, and traceroute hop augmentation.

use crate::dedup::DedupSet;
use crate::error::GatewayError;
use crate::lora::LoraPacket;
use crate::meshtastic::channel::MeshtasticChannel;
use crate::meshtastic::codec::{decode_packet_payload, encode_packet_payload, MeshtasticPacket};
use crate::meshtastic::proto::{Data, PortNum, RouteDiscovery, ROUTE_UNKNOWN_NODE, SNR_UNKNOWN_NODE};
use crate::modem::Modem;
use prost::Message;
use rand::RngCore;
use std::collections::HashMap;

/// LongFast EU_868, the only preset the reference deployment ships with.
pub struct LongFastEu868;

impl LongFastEu868 {
    pub const FREQUENCY_HZ: f64 = 869_525_000.0;
    pub const SPREADING_FACTOR: u8 = 11;
    pub const BANDWIDTH_HZ: u32 = 250_000;
    pub const CODING_RATE_4: u8 = 5;
    pub const PREAMBLE_SYMBOLS: u32 = 16;
    pub const SYNCWORD: u8 = 0x2b;
    pub const TX_POWER_DBM: i32 = 20;
}

/// Apply the LongFast EU_868 preset to a modem, the way the reference
/// gateway configures it at startup.
pub async fn apply_longfast_eu868(modem: &mut Modem) -> Result<(), GatewayError> {
    modem.set_gain(0).await; // AGC
    modem.set_frequency(LongFastEu868::FREQUENCY_HZ).await;
    modem.set_spreading_factor(LongFastEu868::SPREADING_FACTOR).await;
    modem.set_bandwidth(LongFastEu868::BANDWIDTH_HZ).await;
    modem.set_coding_rate(LongFastEu868::CODING_RATE_4).await;
    modem.set_preamble_length(LongFastEu868::PREAMBLE_SYMBOLS).await;
    modem.set_syncword(LongFastEu868::SYNCWORD).await;
    modem.set_tx_power(LongFastEu868::TX_POWER_DBM).await;
    modem.set_aux_lora_settings(true, false, false).await;
    modem.connect_with_retry().await;
    Ok(())
}

/// Default channel name the Python reference uses for its ping
/// responder; kept only as a fallback when no `ping_reply_channel` is
/// configured (see [`crate::config::GatewayConfig`]).
pub const DEFAULT_PING_REPLY_CHANNEL: &str = "gg";

pub struct MeshtasticEngine {
    node_id: u32,
    channels: HashMap<String, MeshtasticChannel>,
    channel_by_hash: HashMap<u8, String>,
    heard: DedupSet<u32>,
    ping_reply_channel: String,
}

impl MeshtasticEngine {
    /// `node_id` should be a random 32-bit value, stable for the life of
    /// the process (the reference implementation seeds it from the host
    /// MAC address so restarts reuse the same ID; this gateway leaves
    /// that choice to the caller).
    pub fn new(
        node_id: u32,
        channels: Vec<MeshtasticChannel>,
        ping_reply_channel: impl Into<String>,
    ) -> Self {
        let mut channel_by_hash = HashMap::new();
        let mut by_name = HashMap::new();
        for c in channels {
            channel_by_hash.insert(c.hash, c.name.clone());
            by_name.insert(c.name.clone(), c);
        }
        Self {
            node_id,
            channels: by_name,
            channel_by_hash,
            heard: DedupSet::new(4096),
            ping_reply_channel: ping_reply_channel.into(),
        }
    }

    fn channel_for_hash(&self, hash: u8) -> Option<&MeshtasticChannel> {
        self.channel_by_hash.get(&hash).and_then(|name| self.channels.get(name))
    }

    /// Processes one received LoRa packet: decodes it against its
    /// channel if recognized, relays it with a decremented hop limit if
    /// still live, augments traceroute payloads on the way through, and
    /// answers `ping` text messages on the configured reply channel. A
    /// packet whose `channelHash` matches none of our configured
    /// channels still relays, undecoded: only decoding and
    /// traceroute/ping processing require a known channel.
    pub async fn handle_rx(
        &mut self,
        raw: &[u8],
        rssi: i32,
        snr: f32,
        modem: &mut Modem,
    ) -> Result<(), GatewayError> {
        let mut packet = MeshtasticPacket::from_bytes(raw)?;
        let channel = self.channel_for_hash(packet.channel_hash).cloned();

        if let Some(channel) = &channel {
            if let Err(e) = decode_packet_payload(&mut packet, channel) {
                log::debug!("could not decrypt/parse packet {}: {e}", packet.packet_id);
            }
        } else {
            log::debug!("no channel for packet's channelHash {}, relaying undecoded", packet.channel_hash);
        }

        let should_relay = packet.hop_limit > 0
            && !self.heard.contains(&packet.packet_id)
            && packet.destination != self.node_id;

        self.heard.insert(packet.packet_id);
        if should_relay {
            self.relay(&packet, channel.as_ref(), snr, modem).await?;
        }

        let Some(payload) = packet.payload.clone() else {
            log::debug!("no payload in packet, cannot process further");
            return Ok(());
        };

        self.maybe_reply_to_ping(&packet, &payload, rssi, snr, modem).await?;
        Ok(())
    }

    /// Forwards `packet` with its hop limit decremented by one. Does not
    /// run any path-quality or intelligent flooding logic: every still-live
    /// packet not addressed to us gets relayed, unconditionally, matching
    /// the reference implementation's "naive" (and explicitly
    /// un-fixed) relay policy. `channel` is `None` when the packet's
    /// `channelHash` matched none of our configured channels; such a
    /// packet still relays as-is, since traceroute re-encoding requires
    /// a known key and is skipped in that case.
    async fn relay(
        &self,
        packet: &MeshtasticPacket,
        channel: Option<&MeshtasticChannel>,
        snr: f32,
        modem: &mut Modem,
    ) -> Result<(), GatewayError> {
        let mut relayed = packet.clone();
        relayed.hop_limit -= 1;
        log::debug!("relaying packet: {}", packet.packet_id);

        if let (Some(channel), Some(payload)) = (channel, relayed.payload.clone()) {
            if PortNum::from_raw(payload.portnum) == PortNum::TracerouteApp {
                relayed.payload_wire = self.augment_traceroute(&relayed, &payload, channel, snr)?;
            }
        }
        modem.tx(&LoraPacket::new(relayed.to_bytes())).await
    }

    /// Appends this node's hop to a traceroute's outbound or return
    /// route, padding any unknown intermediate hops with the firmware's
    /// sentinel values.
    ///
    /// FIXME: on the return leg firmware actually prefers `next_hop`
    /// over appending to `route_back`; this gateway does not implement
    /// that and always appends, matching the reference implementation's
    /// (explicitly unfixed) behavior.
    fn augment_traceroute(
        &self,
        packet: &MeshtasticPacket,
        payload: &Data,
        channel: &MeshtasticChannel,
        snr: f32,
    ) -> Result<Vec<u8>, GatewayError> {
        let mut route = RouteDiscovery::decode(payload.payload.as_slice())
            .map_err(|e| GatewayError::decode(format!("RouteDiscovery: {e}")))?;

        let is_on_way_back = payload.request_id != 0;
        let hops_away = packet.hop_start as i32 - packet.hop_limit as i32;

        let (route_list, snr_list) = if is_on_way_back {
            (&mut route.route_back, &mut route.snr_back)
        } else {
            (&mut route.route, &mut route.snr_towards)
        };

        if hops_away >= 0 {
            while (route_list.len() as i32) < hops_away {
                route_list.push(ROUTE_UNKNOWN_NODE);
            }
            while (snr_list.len() as i32) < hops_away {
                snr_list.push(SNR_UNKNOWN_NODE);
            }
        }
        snr_list.push((snr * 4.0) as i32);
        route_list.push(self.node_id);

        let mut inner = payload.clone();
        inner.payload = route.encode_to_vec();
        Ok(encode_packet_payload(&inner, channel, packet.packet_id, packet.sender)?)
    }

    /// Answers a `ping`-prefixed text message with a `pong RSSI:
    /// ...dBm SNR: ...dB` reply on the configured reply channel.
    async fn maybe_reply_to_ping(
        &mut self,
        packet: &MeshtasticPacket,
        payload: &Data,
        rssi: i32,
        snr: f32,
        modem: &mut Modem,
    ) -> Result<(), GatewayError> {
        let Some(reply_channel) = self.channels.get(&self.ping_reply_channel) else {
            return Ok(());
        };
        if PortNum::from_raw(payload.portnum) != PortNum::TextMessageApp {
            return Ok(());
        }
        if packet.channel_hash != reply_channel.hash {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&payload.payload);
        if !text.starts_with("ping") {
            return Ok(());
        }

        let reply = Data {
            portnum: PortNum::TextMessageApp.to_raw(),
            payload: format!("pong RSSI: {rssi}dBm SNR: {snr}dB").into_bytes(),
            want_response: false,
            dest: 0,
            source: 0,
            request_id: 0,
            reply_id: packet.packet_id,
            emoji: 0,
            bitfield: 0,
        };

        let new_packet_id = rand::thread_rng().next_u32();
        let payload_wire = encode_packet_payload(&reply, reply_channel, new_packet_id, self.node_id)?;
        let out = MeshtasticPacket {
            destination: 0xFFFF_FFFF,
            sender: self.node_id,
            packet_id: new_packet_id,
            hop_limit: 3,
            want_ack: false,
            via_mqtt: false,
            hop_start: 3,
            channel_hash: reply_channel.hash,
            next_hop: 0,
            relay_node: 0,
            payload_wire,
            payload: Some(reply),
        };
        // Don't relay our own packet again if we somehow hear it echoed back.
        self.heard.insert(new_packet_id);
        modem.tx(&LoraPacket::new(out.to_bytes())).await
    }
}
