//! The MeshCore protocol engine: channel registry wiring, decode, and
//! the RSSI-gated repeater policy.

use crate::error::GatewayError;
use crate::lora::LoraPacket;
use crate::meshcore::codec::MeshcorePacket;
use crate::meshcore::node::MeshcoreNode;
use crate::modem::Modem;
use std::time::Duration;
use tokio::sync::mpsc;

/// EU/UK Narrow preset. Frequency/SF/BW/CR are left to the caller
/// (supplied from configuration), matching the reference
/// implementation, which only hardcodes the parameters that define the
/// MeshCore sync domain.
pub struct EuUkNarrowPreset;

impl EuUkNarrowPreset {
    pub const PREAMBLE_SYMBOLS: u32 = 16;
    pub const SYNCWORD: u8 = 0x12; // RADIOLIB_SX126X_SYNC_WORD_PRIVATE
}

/// RSSI threshold above which a received packet is considered "nearby"
/// and repeated at full power rather than the node's normal (low) power.
const NEARBY_RSSI_DBM: i32 = crate::constants::MESHCORE_NEARBY_RSSI_DBM;
const FULL_TX_POWER_DBM: i32 = 20;
const IDLE_TX_POWER_DBM: i32 = 0;
/// Delay before repeating, to avoid colliding with other repeaters'
/// immediate replies.
const PRE_REPEAT_DELAY: Duration = Duration::from_millis(100);

pub async fn apply_eu_uk_narrow_preset(modem: &mut Modem) -> Result<(), GatewayError> {
    modem.set_preamble_length(EuUkNarrowPreset::PREAMBLE_SYMBOLS).await;
    modem.set_syncword(EuUkNarrowPreset::SYNCWORD).await;
    modem.set_aux_lora_settings(true, false, false).await;
    modem.connect_with_retry().await;
    Ok(())
}

pub struct MeshcoreEngine {
    node: MeshcoreNode,
    output: Option<mpsc::UnboundedSender<MeshcorePacket>>,
}

impl MeshcoreEngine {
    pub fn new(node: MeshcoreNode, output: Option<mpsc::UnboundedSender<MeshcorePacket>>) -> Self {
        Self { node, output }
    }

    /// Decodes one received raw MeshCore frame, forwards the decoded
    /// packet to the output queue if one is configured, then repeats
    /// the original raw bytes per the RSSI-gated power policy.
    pub async fn handle_rx(&mut self, raw: &[u8], rssi: i32, modem: &mut Modem) -> Result<(), GatewayError> {
        let packet = MeshcorePacket::deserialize(&self.node, raw)?;
        log::debug!("deserialized: {packet:?}");

        if let Some(tx) = &self.output {
            let _ = tx.send(packet);
        }

        self.repeat(raw, rssi, modem).await
    }

    /// Repeats at full power for nearby senders, restoring the idle
    /// power level afterward even if the transmit itself fails — the
    /// restore always runs, mirroring the reference implementation's
    /// `finally` block.
    async fn repeat(&self, raw: &[u8], rssi: i32, modem: &mut Modem) -> Result<(), GatewayError> {
        let repeat_full_power = rssi > NEARBY_RSSI_DBM;
        tokio::time::sleep(PRE_REPEAT_DELAY).await;

        if repeat_full_power {
            log::debug!("repeating this packet with full power");
            modem.set_tx_power(FULL_TX_POWER_DBM).await;
        }
        let tx_result = modem.tx(&LoraPacket::new(raw.to_vec())).await;
        if repeat_full_power {
            modem.set_tx_power(IDLE_TX_POWER_DBM).await;
        }
        tx_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearby_threshold_matches_constant() {
        assert_eq!(NEARBY_RSSI_DBM, -80);
    }
}
