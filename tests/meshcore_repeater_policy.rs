//! S6: the RSSI-gated repeater power policy. Nearby transmitters get
//! repeated at full power, with tx_power always restored to idle
//! afterward.


use lora_mesh_gateway::meshcore::node::MeshcoreNode;
use lora_mesh_gateway::meshcore::MeshcoreEngine;
use lora_mesh_gateway::modem::Modem;
use mock_link::MockLink;

fn tx_power_settings(sent: &std::sync::Mutex<Vec<serde_json::Value>>) -> Vec<i64> {
    sent.lock()
        .unwrap()
        .iter()
        .filter_map(|v| v.get("txPower").and_then(|p| p.as_i64()))
        .collect()
}

#[tokio::test]
async fn nearby_packet_is_repeated_at_full_power_then_restored() {
    let (link, sent) = MockLink::new();
    let mut modem = Modem::new(Box::new(link)).unwrap();
    let mut engine = MeshcoreEngine::new(MeshcoreNode::with_default_channels(), None);

    // Direct route, raw payload type, no transport codes, empty path.
    let raw = vec![0b0000_1010u8, 0x00];

    engine.handle_rx(&raw, -50, &mut modem).await.unwrap();

    assert_eq!(tx_power_settings(&sent), vec![20, 0], "full power then restored to idle");
}

#[tokio::test]
async fn distant_packet_is_repeated_at_idle_power_without_toggling() {
    let (link, sent) = MockLink::new();
    let mut modem = Modem::new(Box::new(link)).unwrap();
    let mut engine = MeshcoreEngine::new(MeshcoreNode::with_default_channels(), None);

    let raw = vec![0b0000_1010u8, 0x00];

    engine.handle_rx(&raw, -95, &mut modem).await.unwrap();

    assert!(tx_power_settings(&sent).is_empty(), "idle-power repeats never touch txPower");
}
