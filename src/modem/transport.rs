//! NDJSON transports to the LoRa modem: TCP or serial, both reconnecting
//! on their own after a line-level failure.
//!
//! Each transport owns exactly one socket/port: there is never more than
//! one reader task per transport, so line framing and JSON parsing need
//! no synchronization. `send_line` and `recv_line` both see a transport
//! that may currently be disconnected; callers (the [`crate::modem::facade::Modem`])
//! decide what to do about that rather than the transport retrying for them.

use crate::error::GatewayError;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;

/// Delay between a failed connection attempt and the next one, matching
/// the Python modem driver's fixed one-second backoff.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// A single JSON line exchanged with the modem over whichever physical
/// transport is in use.
#[async_trait::async_trait]
pub trait ModemLink: Send {
    async fn connect(&mut self) -> Result<(), GatewayError>;
    async fn send_line(&mut self, value: &Value) -> Result<(), GatewayError>;
    async fn recv_line(&mut self) -> Result<Value, GatewayError>;
    fn is_connected(&self) -> bool;
}

/// TCP transport, 15s connect/read timeout mirroring the Python ESP32
/// wifi driver.
pub struct TcpLink {
    host: String,
    port: u16,
    stream: Option<BufReader<TcpStream>>,
}

impl TcpLink {
    const TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, stream: None }
    }
}

#[async_trait::async_trait]
impl ModemLink for TcpLink {
    async fn connect(&mut self) -> Result<(), GatewayError> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = timeout(Self::TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| GatewayError::transport(format!("connect to {addr} timed out")))?
            .map_err(|e| GatewayError::transport(format!("connect to {addr} failed: {e}")))?;
        self.stream = Some(BufReader::new(stream));
        Ok(())
    }

    async fn send_line(&mut self, value: &Value) -> Result<(), GatewayError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| GatewayError::transport("no tx, not connected"))?;
        let mut line = serde_json::to_string(value)
            .map_err(|e| GatewayError::transport(format!("encode failed: {e}")))?;
        line.push('\n');
        stream
            .get_mut()
            .write_all(line.as_bytes())
            .await
            .map_err(|e| GatewayError::transport(e.to_string()))?;
        Ok(())
    }

    async fn recv_line(&mut self) -> Result<Value, GatewayError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| GatewayError::transport("not connected"))?;
        let mut line = String::new();
        let n = timeout(Self::TIMEOUT, stream.read_line(&mut line))
            .await
            .map_err(|_| GatewayError::transport("read timed out"))?
            .map_err(|e| GatewayError::transport(e.to_string()))?;
        if n == 0 {
            self.stream = None;
            return Err(GatewayError::transport("connection closed"));
        }
        serde_json::from_str(&line)
            .map_err(|e| GatewayError::decode(format!("line causing error {line:?}: {e}")))
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Serial transport, 10s read timeout matching the Python pyserial driver
/// (`baudrate=115200, bytesize=8, timeout=10, stopbits=ONE`).
pub struct SerialLink {
    port_name: String,
    port: Option<BufReader<tokio_serial::SerialStream>>,
}

impl SerialLink {
    const BAUD_RATE: u32 = 115_200;
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(port_name: impl Into<String>) -> Self {
        Self { port_name: port_name.into(), port: None }
    }
}

#[async_trait::async_trait]
impl ModemLink for SerialLink {
    async fn connect(&mut self) -> Result<(), GatewayError> {
        let port = tokio_serial::new(&self.port_name, Self::BAUD_RATE)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(Self::TIMEOUT)
            .open_native_async()
            .map_err(|e| GatewayError::transport(format!("open {} failed: {e}", self.port_name)))?;
        self.port = Some(BufReader::new(port));
        Ok(())
    }

    async fn send_line(&mut self, value: &Value) -> Result<(), GatewayError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| GatewayError::transport("no tx, not connected"))?;
        let mut line = serde_json::to_string(value)
            .map_err(|e| GatewayError::transport(format!("encode failed: {e}")))?;
        line.push('\n');
        port.get_mut()
            .write_all(line.as_bytes())
            .await
            .map_err(|e| GatewayError::transport(e.to_string()))?;
        Ok(())
    }

    async fn recv_line(&mut self) -> Result<Value, GatewayError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| GatewayError::transport("not connected"))?;
        let mut line = String::new();
        let n = port
            .read_line(&mut line)
            .await
            .map_err(|e| GatewayError::transport(e.to_string()))?;
        if n == 0 {
            self.port = None;
            return Err(GatewayError::transport("connection closed"));
        }
        serde_json::from_str(&line)
            .map_err(|e| GatewayError::decode(format!("line causing error {line:?}: {e}")))
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
