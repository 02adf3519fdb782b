//! The modem facade: the single point where both protocol engines talk
//! to LoRa hardware.
//!
//! Wraps a [`ModemLink`], replaying accumulated [`ModemSettings`] on
//! every (re)connect, and instruments every TX/RX with airtime and
//! duty-cycle accounting. Settings and duty trackers are safe to own as
//! plain fields rather than behind a mutex: the facade itself is meant
//! to be driven from a single task (see [`crate::supervisor`]), mirroring
//! the "one reader owns the transport" rule the modem driver this is
//! grounded on relies on.

use crate::error::GatewayError;
use crate::lora::airtime::calculate_airtime;
use crate::lora::duty_cycle::DutyCycleTracker;
use crate::lora::settings::{ModemSettings, SettingKey};
use crate::lora::{LoraPacket, LoraPacketRx};
use crate::modem::transport::{ModemLink, RECONNECT_BACKOFF};
use std::time::Instant;

/// LoRa radio parameters required to compute airtime; mirrors the
/// attributes the Python driver tracks before it will calculate
/// on-air time for a packet.
#[derive(Debug, Clone, Copy, Default)]
struct RadioParams {
    spreading_factor: Option<u8>,
    bandwidth_hz: Option<u32>,
    coding_rate_4: Option<u8>,
    preamble_symbols: Option<u32>,
    crc: Option<bool>,
    low_data_rate_optimize: Option<bool>,
}

impl RadioParams {
    fn airtime(&self, payload_bytes: usize) -> Result<f64, GatewayError> {
        let sf = self
            .spreading_factor
            .ok_or_else(|| GatewayError::precondition("spreading_factor not set"))?;
        let bw = self
            .bandwidth_hz
            .ok_or_else(|| GatewayError::precondition("bandwidth not set"))?;
        let cr = self
            .coding_rate_4
            .ok_or_else(|| GatewayError::precondition("coding_rate not set"))?;
        let preamble = self
            .preamble_symbols
            .ok_or_else(|| GatewayError::precondition("preamble_length not set"))?;
        let crc = self.crc.ok_or_else(|| GatewayError::precondition("crc not set"))?;
        let ldro = self
            .low_data_rate_optimize
            .ok_or_else(|| GatewayError::precondition("low_data_rate_optimize not set"))?;
        Ok(calculate_airtime(sf, bw, cr, preamble, crc, ldro, true, payload_bytes))
    }
}

pub struct Modem {
    link: Box<dyn ModemLink>,
    settings: ModemSettings,
    params: RadioParams,
    dt_rx: DutyCycleTracker,
    dt_tx: DutyCycleTracker,
    last_rx_report: Instant,
    last_tx_report: Instant,
}

impl Modem {
    const OBSERVATION_WINDOW_SECS: f64 = 60.0 * 60.0;
    const BUCKET_SECS: f64 = 60.0;

    pub fn new(link: Box<dyn ModemLink>) -> Result<Self, GatewayError> {
        let now = Instant::now();
        Ok(Self {
            link,
            settings: ModemSettings::new(),
            params: RadioParams::default(),
            dt_rx: DutyCycleTracker::new(Self::OBSERVATION_WINDOW_SECS, Self::BUCKET_SECS)?,
            dt_tx: DutyCycleTracker::new(Self::OBSERVATION_WINDOW_SECS, Self::BUCKET_SECS)?,
            last_rx_report: now,
            last_tx_report: now,
        })
    }

    /// Connects (or reconnects) and replays the accumulated settings, the
    /// way the Python driver re-sends `self._settings_data` right after
    /// the socket/port opens.
    pub async fn connect(&mut self) -> Result<(), GatewayError> {
        self.link.connect().await?;
        if !self.settings.is_empty() {
            self.link.send_line(&self.settings.to_wire_message()).await?;
        }
        Ok(())
    }

    /// Runs the reconnect loop until `connect` succeeds, sleeping
    /// [`RECONNECT_BACKOFF`] between attempts, matching the Python
    /// driver's fixed one-second backoff.
    pub async fn connect_with_retry(&mut self) {
        loop {
            match self.connect().await {
                Ok(()) => return,
                Err(e) => {
                    log::warn!("modem connect failed, retrying: {e}");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            }
        }
    }

    /// Pushes a single-key incremental settings message if the transport
    /// is currently up; always buffers into `self.settings` regardless,
    /// so a disconnected push is simply replayed in full on reconnect.
    async fn push_incremental(&mut self, key: &str, value: serde_json::Value) {
        if self.link.is_connected() {
            let wire = serde_json::json!({ "type": "settings", key: value });
            if let Err(e) = self.link.send_line(&wire).await {
                log::warn!("failed to push setting '{key}': {e}");
            }
        }
    }

    pub async fn set_frequency(&mut self, hz: f64) {
        self.settings.set_numeric(SettingKey::Frequency, hz);
        self.push_incremental(SettingKey::Frequency.wire_name(), serde_json::json!(hz)).await;
    }

    pub async fn set_spreading_factor(&mut self, sf: u8) {
        self.params.spreading_factor = Some(sf);
        self.settings.set_numeric(SettingKey::SpreadingFactor, sf as f64);
        self.push_incremental(SettingKey::SpreadingFactor.wire_name(), serde_json::json!(sf)).await;
    }

    pub async fn set_bandwidth(&mut self, hz: u32) {
        self.params.bandwidth_hz = Some(hz);
        self.settings.set_numeric(SettingKey::Bandwidth, hz as f64);
        self.push_incremental(SettingKey::Bandwidth.wire_name(), serde_json::json!(hz)).await;
    }

    pub async fn set_coding_rate(&mut self, cr4: u8) {
        self.params.coding_rate_4 = Some(cr4);
        self.settings.set_numeric(SettingKey::CodingRate, cr4 as f64);
        self.push_incremental(SettingKey::CodingRate.wire_name(), serde_json::json!(cr4)).await;
    }

    pub async fn set_preamble_length(&mut self, symbols: u32) {
        self.params.preamble_symbols = Some(symbols);
        self.settings.set_numeric(SettingKey::PreambleLength, symbols as f64);
        self.push_incremental(SettingKey::PreambleLength.wire_name(), serde_json::json!(symbols)).await;
    }

    pub async fn set_syncword(&mut self, syncword: u8) {
        self.settings.set_numeric(SettingKey::Syncword, syncword as f64);
        self.push_incremental(SettingKey::Syncword.wire_name(), serde_json::json!(syncword)).await;
    }

    pub async fn set_tx_power(&mut self, dbm: i32) {
        self.settings.set_numeric(SettingKey::TxPower, dbm as f64);
        self.push_incremental(SettingKey::TxPower.wire_name(), serde_json::json!(dbm)).await;
    }

    /// `gain` is on the Python driver's `0..=10` scale; `0` means AGC.
    pub async fn set_gain(&mut self, gain: i64) {
        self.settings.set_gain(gain);
        let wire_value = if gain == 0 { 0 } else { ((gain * 6) / 10).max(1) };
        self.push_incremental(SettingKey::Gain.wire_name(), serde_json::json!(wire_value)).await;
    }

    pub async fn set_aux_lora_settings(&mut self, crc: bool, invert_iq: bool, low_data_rate_optimize: bool) {
        self.params.crc = Some(crc);
        self.params.low_data_rate_optimize = Some(low_data_rate_optimize);
        self.settings.set_bool(SettingKey::Crc, crc);
        self.settings.set_bool(SettingKey::InvertIq, invert_iq);
        self.settings.set_bool(SettingKey::LowDataRateOptimize, low_data_rate_optimize);
        if self.link.is_connected() {
            let wire = serde_json::json!({
                "type": "settings",
                "CRC": crc,
                "invertIQ": invert_iq,
                "lowDataRateOptimize": low_data_rate_optimize,
            });
            if let Err(e) = self.link.send_line(&wire).await {
                log::warn!("failed to push aux LoRa settings: {e}");
            }
        }
    }

    /// Transmits a packet, then accounts for its airtime. A missing radio
    /// parameter degrades to a skipped duty-cycle update rather than a
    /// failed transmit: the packet still goes out.
    pub async fn tx(&mut self, packet: &LoraPacket) -> Result<(), GatewayError> {
        let wire = serde_json::json!({
            "type": "packetTx",
            "data": packet.data,
            "cad": true,
            "cadWait": 2000,
            "cadTimeout": 10000,
        });
        self.link.send_line(&wire).await?;
        match self.params.airtime(packet.data.len()) {
            Ok(airtime) => {
                let elapsed = self.last_tx_report.elapsed().as_secs_f64();
                self.last_tx_report = Instant::now();
                if let Err(e) = self.dt_tx.report(elapsed, airtime) {
                    log::warn!("tx duty cycle report failed: {e}");
                } else {
                    log::debug!("tx airtime: {airtime:.4}s");
                }
            }
            Err(e) => log::debug!("skipping tx airtime accounting: {e}"),
        }
        Ok(())
    }

    /// Reads one line from the modem and, if it is a `packetRx` message,
    /// returns the decoded packet. Non-packet messages (telemetry, acks)
    /// return `Ok(None)` rather than an error, mirroring the Python
    /// driver's `_rx_data` dispatch. A line that fails to parse as JSON
    /// is a transient, self-healing condition on an otherwise-live
    /// connection: it's logged and treated as `Ok(None)` rather than
    /// propagated, so the caller never reconnects over it (only a real
    /// `GatewayError::Transport` does that).
    pub async fn recv(&mut self) -> Result<Option<LoraPacketRx>, GatewayError> {
        let value = match self.link.recv_line().await {
            Ok(value) => value,
            Err(GatewayError::Decode(e)) => {
                log::debug!("dropping unparsable line from modem: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let msg_type = value.get("type").and_then(|v| v.as_str()).unwrap_or("");
        if msg_type != "telemetry" {
            log::debug!("rx from modem: {value}");
        }
        if msg_type != "packetRx" {
            return Ok(None);
        }
        let packet = parse_packet_rx(&value)?;
        match self.params.airtime(packet.data.len()) {
            Ok(airtime) => {
                let elapsed = self.last_rx_report.elapsed().as_secs_f64();
                self.last_rx_report = Instant::now();
                if let Err(e) = self.dt_rx.report(elapsed, airtime) {
                    log::warn!("rx duty cycle report failed: {e}");
                } else {
                    log::debug!("rx airtime: {airtime:.4}s");
                }
            }
            Err(e) => log::debug!("skipping rx airtime accounting: {e}"),
        }
        Ok(Some(packet))
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }
}

fn parse_packet_rx(value: &serde_json::Value) -> Result<LoraPacketRx, GatewayError> {
    let data = value
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| GatewayError::decode("packetRx missing data array"))?
        .iter()
        .map(|b| b.as_u64().map(|b| b as u8))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| GatewayError::decode("packetRx data array has non-byte entries"))?;
    let rssi = value
        .get("rssi")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| GatewayError::decode("packetRx missing rssi"))? as i32;
    let snr = value
        .get("snr")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| GatewayError::decode("packetRx missing snr"))? as f32;
    let freq_error = value
        .get("freqError")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| GatewayError::decode("packetRx missing freqError"))? as i32;
    Ok(LoraPacketRx { data, snr, rssi, freq_error })
}
