//! The glue contract this gateway exposes to an external supervisor:
//! lifecycle (start/stop), an RX-consumer binding, and channel feeds.
//!
//! Everything in this module is a thin seam — persistence, HTTP
//! surfacing, and process lifecycle are all the supervisor's
//! responsibility, not this crate's. The engines never reach back into
//! it.

use crate::error::GatewayError;
use crate::meshcore::codec::MeshcorePacket;
use crate::meshcore::engine::{apply_eu_uk_narrow_preset, MeshcoreEngine};
use crate::meshcore::node::MeshcoreNode;
use crate::meshtastic::engine::{apply_longfast_eu868, MeshtasticEngine};
use crate::meshtastic::MeshtasticChannel;
use crate::modem::Modem;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Runs the Meshtastic engine against a modem until `stop` is called
/// (dropping the returned handle without awaiting it leaves the task
/// running; callers that want a clean shutdown should store it and
/// abort it instead).
pub struct MeshtasticSupervisor {
    handle: JoinHandle<()>,
}

impl MeshtasticSupervisor {
    pub async fn start(
        mut modem: Modem,
        node_id: u32,
        channels: Vec<MeshtasticChannel>,
        ping_reply_channel: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        apply_longfast_eu868(&mut modem).await?;
        let mut engine = MeshtasticEngine::new(node_id, channels, ping_reply_channel);
        let handle = tokio::spawn(async move {
            loop {
                match modem.recv().await {
                    Ok(Some(packet)) => {
                        if let Err(e) = engine
                            .handle_rx(&packet.data, packet.rssi, packet.snr, &mut modem)
                            .await
                        {
                            log::debug!("exception ingesting meshtastic packet: {e}");
                        }
                    }
                    Ok(None) => {}
                    Err(GatewayError::Transport(e)) => {
                        log::warn!("modem transport failed, reconnecting: {e}");
                        modem.connect_with_retry().await;
                    }
                    Err(e) => {
                        log::debug!("dropping unreadable packet from modem: {e}");
                    }
                }
            }
        });
        Ok(Self { handle })
    }

    /// Idempotent: aborting an already-finished task is a no-op.
    pub fn stop(self) {
        self.handle.abort();
    }
}

/// Runs the MeshCore engine against a modem until `stop` is called.
pub struct MeshcoreSupervisor {
    handle: JoinHandle<()>,
}

impl MeshcoreSupervisor {
    pub async fn start(
        mut modem: Modem,
        node: MeshcoreNode,
        output: Option<mpsc::UnboundedSender<MeshcorePacket>>,
    ) -> Result<Self, GatewayError> {
        apply_eu_uk_narrow_preset(&mut modem).await?;
        let mut engine = MeshcoreEngine::new(node, output);
        let handle = tokio::spawn(async move {
            loop {
                match modem.recv().await {
                    Ok(Some(packet)) => {
                        if let Err(e) = engine.handle_rx(&packet.data, packet.rssi, &mut modem).await {
                            log::debug!("exception ingesting meshcore packet: {e}");
                        }
                    }
                    Ok(None) => {}
                    Err(GatewayError::Transport(e)) => {
                        log::warn!("modem transport failed, reconnecting: {e}");
                        modem.connect_with_retry().await;
                    }
                    Err(e) => {
                        log::debug!("dropping unreadable packet from modem: {e}");
                    }
                }
            }
        });
        Ok(Self { handle })
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
