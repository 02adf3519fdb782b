//! Modem transport and facade: everything that talks NDJSON to the LoRa
//! radio, shared by both protocol engines.

pub mod facade;
pub mod transport;

pub use facade::Modem;
pub use transport::{ModemLink, SerialLink, TcpLink};
