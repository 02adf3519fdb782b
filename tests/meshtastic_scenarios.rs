//! Meshtastic end-to-end scenarios: ping/pong, relay dedup, and
//! traceroute hop augmentation, all driven through the real engine and
//! a mocked modem transport.


use lora_mesh_gateway::meshtastic::codec::{decrypt_payload, encode_packet_payload, MeshtasticPacket};
use lora_mesh_gateway::meshtastic::proto::{Data, PortNum, RouteDiscovery};
use lora_mesh_gateway::meshtastic::{MeshtasticChannel, MeshtasticEngine};
use lora_mesh_gateway::modem::Modem;
use mock_link::MockLink;
use prost::Message;

fn channel() -> MeshtasticChannel {
    MeshtasticChannel::new("gg", "AQ==").unwrap()
}

fn sent_tx_data(sent: &std::sync::Mutex<Vec<serde_json::Value>>) -> Vec<Vec<u8>> {
    sent.lock()
        .unwrap()
        .iter()
        .filter(|v| v["type"] == "packetTx")
        .map(|v| {
            v["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|b| b.as_u64().unwrap() as u8)
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn s1_ping_gets_a_pong_reply() {
    let (link, sent) = MockLink::new();
    let mut modem = Modem::new(Box::new(link)).unwrap();
    let ch = channel();
    let mut engine = MeshtasticEngine::new(0xAABBCCDD, vec![ch.clone()], "gg");

    let payload = Data {
        portnum: PortNum::TextMessageApp.to_raw(),
        payload: b"ping".to_vec(),
        want_response: false,
        dest: 0xFFFF_FFFF,
        source: 0x1111,
        request_id: 0,
        reply_id: 0,
        emoji: 0,
        bitfield: 0,
    };
    let packet = MeshtasticPacket {
        destination: 0xFFFF_FFFF,
        sender: 0x1111,
        packet_id: 7,
        hop_limit: 0, // not relayed, just answered
        want_ack: false,
        via_mqtt: false,
        hop_start: 0,
        channel_hash: ch.hash,
        next_hop: 0,
        relay_node: 0,
        payload_wire: encode_packet_payload(&payload, &ch, 7, 0x1111).unwrap(),
        payload: None,
    };

    engine
        .handle_rx(&packet.to_bytes(), -60, 8.0, &mut modem)
        .await
        .unwrap();

    let replies = sent_tx_data(&sent);
    assert_eq!(replies.len(), 1);
    let reply = MeshtasticPacket::from_bytes(&replies[0]).unwrap();
    assert_eq!(reply.destination, 0xFFFF_FFFF);
    let decrypted = decrypt_payload(&ch, reply.packet_id, reply.sender, reply.payload_wire).unwrap();
    let reply_data = Data::decode(decrypted.as_slice()).unwrap();
    let text = String::from_utf8(reply_data.payload).unwrap();
    assert!(text.starts_with("pong"), "unexpected reply text: {text}");
}

#[tokio::test]
async fn s2_duplicate_packet_id_is_relayed_only_once() {
    let (link, sent) = MockLink::new();
    let mut modem = Modem::new(Box::new(link)).unwrap();
    let ch = channel();
    let mut engine = MeshtasticEngine::new(99, vec![ch.clone()], "gg");

    let payload = Data {
        portnum: PortNum::Other(5).to_raw(),
        payload: b"hi".to_vec(),
        want_response: false,
        dest: 0,
        source: 0,
        request_id: 0,
        reply_id: 0,
        emoji: 0,
        bitfield: 0,
    };
    let packet = MeshtasticPacket {
        destination: 0xFFFF_FFFF,
        sender: 42,
        packet_id: 123,
        hop_limit: 3,
        want_ack: false,
        via_mqtt: false,
        hop_start: 3,
        channel_hash: ch.hash,
        next_hop: 0,
        relay_node: 0,
        payload_wire: encode_packet_payload(&payload, &ch, 123, 42).unwrap(),
        payload: None,
    };
    let raw = packet.to_bytes();

    engine.handle_rx(&raw, -70, 5.0, &mut modem).await.unwrap();
    engine.handle_rx(&raw, -70, 5.0, &mut modem).await.unwrap();

    assert_eq!(sent_tx_data(&sent).len(), 1, "second hearing of the same packet must not be relayed again");
}

#[tokio::test]
async fn s3_traceroute_forward_leg_gains_a_hop() {
    let (link, sent) = MockLink::new();
    let mut modem = Modem::new(Box::new(link)).unwrap();
    let ch = channel();
    let mut engine = MeshtasticEngine::new(77, vec![ch.clone()], "gg");

    let route = RouteDiscovery::default();
    let payload = Data {
        portnum: PortNum::TracerouteApp.to_raw(),
        payload: route.encode_to_vec(),
        want_response: false,
        dest: 0,
        source: 0,
        request_id: 0, // forward leg: request still outbound
        reply_id: 0,
        emoji: 0,
        bitfield: 0,
    };
    let packet = MeshtasticPacket {
        destination: 0xFFFF_FFFF,
        sender: 1,
        packet_id: 55,
        hop_limit: 2,
        want_ack: false,
        via_mqtt: false,
        hop_start: 3,
        channel_hash: ch.hash,
        next_hop: 0,
        relay_node: 0,
        payload_wire: encode_packet_payload(&payload, &ch, 55, 1).unwrap(),
        payload: None,
    };

    engine
        .handle_rx(&packet.to_bytes(), -50, 12.0, &mut modem)
        .await
        .unwrap();

    let relayed = sent_tx_data(&sent);
    assert_eq!(relayed.len(), 1);
    let relayed_packet = MeshtasticPacket::from_bytes(&relayed[0]).unwrap();
    assert_eq!(relayed_packet.hop_limit, 1, "relay must decrement hop_limit");
    let decrypted = decrypt_payload(&ch, relayed_packet.packet_id, relayed_packet.sender, relayed_packet.payload_wire).unwrap();
    let route = RouteDiscovery::decode(decrypted.as_slice()).unwrap();
    assert_eq!(route.route.last().copied(), Some(77));
}

#[tokio::test]
async fn packet_on_an_unknown_channel_still_relays_undecoded() {
    let (link, sent) = MockLink::new();
    let mut modem = Modem::new(Box::new(link)).unwrap();
    let ch = channel();
    let mut engine = MeshtasticEngine::new(77, vec![ch.clone()], "gg");

    let packet = MeshtasticPacket {
        destination: 0xFFFF_FFFF,
        sender: 1,
        packet_id: 901,
        hop_limit: 3,
        want_ack: false,
        via_mqtt: false,
        hop_start: 3,
        channel_hash: ch.hash ^ 0xFF, // no configured channel has this hash
        next_hop: 0,
        relay_node: 0,
        payload_wire: vec![0xDE, 0xAD, 0xBE, 0xEF],
        payload: None,
    };
    let raw = packet.to_bytes();

    engine.handle_rx(&raw, -60, 6.0, &mut modem).await.unwrap();

    let relayed = sent_tx_data(&sent);
    assert_eq!(relayed.len(), 1, "an unrecognized channelHash must not block relay");
    let relayed_packet = MeshtasticPacket::from_bytes(&relayed[0]).unwrap();
    assert_eq!(relayed_packet.hop_limit, 2);
    assert_eq!(relayed_packet.payload_wire, vec![0xDE, 0xAD, 0xBE, 0xEF], "undecoded payload passes through unchanged");
}
