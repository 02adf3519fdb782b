//! Demo configuration loading.
//!
//! A real deployment's configuration loader is an external
//! collaborator's responsibility; this is only what the demo binary
//! needs to stand the gateway up, modeled on the reference
//! implementation's flat `channels.json`.

use crate::error::GatewayError;
use crate::meshcore::node::MeshcoreNode;
use crate::meshtastic::MeshtasticChannel;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct MeshtasticChannelConfig {
    name: String,
    psk: String,
}

#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    meshtastic_channels: Vec<MeshtasticChannelConfig>,
    #[serde(default)]
    meshcore_channels: HashMap<String, String>,
    #[serde(default = "default_ping_reply_channel")]
    ping_reply_channel: String,
}

fn default_ping_reply_channel() -> String {
    crate::meshtastic::engine::DEFAULT_PING_REPLY_CHANNEL.to_string()
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GatewayError::config(format!("reading {}: {e}", path.as_ref().display())))?;
        serde_json::from_str(&text).map_err(|e| GatewayError::config(format!("parsing config: {e}")))
    }

    pub fn ping_reply_channel(&self) -> &str {
        &self.ping_reply_channel
    }

    pub fn meshtastic_channels(&self) -> Result<Vec<MeshtasticChannel>, GatewayError> {
        self.meshtastic_channels
            .iter()
            .map(|c| MeshtasticChannel::new(&c.name, &c.psk))
            .collect()
    }

    /// Builds a [`MeshcoreNode`] from the configured channels, falling
    /// back to the default Public/#test/#ping set when none are given.
    pub fn meshcore_node(&self) -> Result<MeshcoreNode, GatewayError> {
        if self.meshcore_channels.is_empty() {
            return Ok(MeshcoreNode::with_default_channels());
        }
        let mut channels = HashMap::new();
        for (name, hex_key) in &self.meshcore_channels {
            let bytes = hex::decode(hex_key)
                .map_err(|e| GatewayError::config(format!("channel '{name}' key is not hex: {e}")))?;
            let key: [u8; 16] = bytes
                .try_into()
                .map_err(|_| GatewayError::config(format!("channel '{name}' key must be 16 bytes")))?;
            channels.insert(name.clone(), key);
        }
        Ok(MeshcoreNode::new(channels))
    }
}
