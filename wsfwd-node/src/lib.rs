//! wsfwd Node - protocol core of the WebSocket-to-BLE forwarder
//!
//! The node keeps a session with the controller, authenticates, reports
//! peripheral telemetry and relays hex-encoded commands to the peripheral.
//! Platform pieces (transport, radio, clock) come in through the traits in
//! `wsfwd-mcu`.

mod bridge;
mod config;
mod session;

#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use config::{BridgeConfig, ConfigError, Credentials, Endpoint};
pub use session::{LinkState, BATTERY_SETTLE_MS, STATUS_INTERVAL_MS};

// Re-export commonly used types
pub use wsfwd_mcu::{Channel, Clock, PeripheralLink, Telemetry, Transport};
pub use wsfwd_proto::{Inbound, Outbound, ParseError};
