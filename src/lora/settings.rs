//! Logical LoRa settings and their modem wire-format names.
//!
//! The modem only understands a flat JSON object of wire-named fields
//! (`"spreadingFactor"`, `"signalBandwidth"`, ...); the engines only
//! think in terms of these logical keys. [`ModemSettings`] is the single
//! place that knows the mapping between the two, including the one
//! nonlinear case: gain is given to us on a 0..1 scale but the modem
//! wire format wants 1..6.

use serde_json::{Map, Value};

/// One LoRa radio parameter, keyed by its logical (protocol-facing) name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingKey {
    Frequency,
    SpreadingFactor,
    Bandwidth,
    CodingRate,
    PreambleLength,
    Syncword,
    TxPower,
    Gain,
    Crc,
    InvertIq,
    LowDataRateOptimize,
}

impl SettingKey {
    /// The modem wire protocol's field name for this setting.
    pub fn wire_name(self) -> &'static str {
        match self {
            SettingKey::Frequency => "frequency",
            SettingKey::SpreadingFactor => "spreadingFactor",
            SettingKey::Bandwidth => "signalBandwidth",
            SettingKey::CodingRate => "codingRate4",
            SettingKey::PreambleLength => "preambleLength",
            SettingKey::Syncword => "syncWord",
            SettingKey::TxPower => "txPower",
            SettingKey::Gain => "gain",
            SettingKey::Crc => "CRC",
            SettingKey::InvertIq => "invertIQ",
            SettingKey::LowDataRateOptimize => "lowDataRateOptimize",
        }
    }
}

/// A pending (or already-applied) set of modem settings, held as a flat
/// map so it can be replayed verbatim to the modem after a reconnect.
#[derive(Debug, Clone, Default)]
pub struct ModemSettings {
    wire: Map<String, Value>,
}

impl ModemSettings {
    pub fn new() -> Self {
        Self { wire: Map::new() }
    }

    pub fn set_numeric(&mut self, key: SettingKey, value: f64) {
        self.wire
            .insert(key.wire_name().to_string(), serde_json::json!(value));
    }

    pub fn set_bool(&mut self, key: SettingKey, value: bool) {
        self.wire
            .insert(key.wire_name().to_string(), serde_json::json!(value));
    }

    /// Sets gain from a logical `0..=10` scale. A value of `0` requests
    /// automatic gain control (sent through unscaled, as `0`); any other
    /// value is rescaled onto the modem's `1..=6` gain stage range,
    /// floored to at least `1`.
    pub fn set_gain(&mut self, gain: i64) {
        let wire_value = if gain == 0 { 0 } else { ((gain * 6) / 10).max(1) };
        self.wire
            .insert(SettingKey::Gain.wire_name().to_string(), serde_json::json!(wire_value));
    }

    /// Serializes the settings accumulated so far into a `"settings"`
    /// modem message, ready to hand to [`crate::modem::transport`].
    /// Always carries `"receive": true`: this gateway never wants the
    /// modem to sit silently with RX disabled, on the first connect or
    /// any later replay.
    pub fn to_wire_message(&self) -> Value {
        let mut obj = self.wire.clone();
        obj.insert("type".to_string(), Value::String("settings".to_string()));
        obj.insert("receive".to_string(), Value::Bool(true));
        Value::Object(obj)
    }

    pub fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_zero_stays_zero() {
        let mut s = ModemSettings::new();
        s.set_gain(0);
        assert_eq!(s.wire["gain"], serde_json::json!(0));
    }

    #[test]
    fn gain_scales_and_floors_to_one() {
        let mut s = ModemSettings::new();
        s.set_gain(1);
        assert_eq!(s.wire["gain"], serde_json::json!(1));
    }

    #[test]
    fn wire_message_carries_type_tag() {
        let mut s = ModemSettings::new();
        s.set_numeric(SettingKey::Frequency, 869_525_000.0);
        let msg = s.to_wire_message();
        assert_eq!(msg["type"], "settings");
        assert_eq!(msg["frequency"], 869_525_000.0);
    }

    #[test]
    fn wire_message_always_enables_receive() {
        let s = ModemSettings::new();
        assert!(s.is_empty(), "an unset ModemSettings is still empty");
        let msg = s.to_wire_message();
        assert_eq!(msg["receive"], true);
    }
}
