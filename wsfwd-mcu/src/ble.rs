//! Peripheral Link Traits
//!
//! The radio stack owns the connection to the peripheral. The bridge only
//! writes frames to it and reads values that the stack keeps cached.

/// Cached telemetry values exposed by the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Battery level in percent
    Battery,
    /// Signal strength in dBm
    Rssi,
}

/// Trait for writing to the peripheral's control channel
///
/// MCU-specific crates implement this trait using their BLE stack.
pub trait PeripheralLink {
    /// Write a frame to the control characteristic (non-blocking)
    ///
    /// The characteristic is located on every call. Returns false when it
    /// cannot be found; the write itself is fire-and-forget.
    fn write(&mut self, data: &[u8]) -> bool;

    /// Enable or disable connection management for the peripheral
    fn set_enabled(&mut self, enabled: bool);
}

/// Trait for reading cached peripheral telemetry
///
/// Reads never touch the radio, they return whatever the stack last stored.
pub trait Telemetry {
    /// Last known value of a channel, `None` when nothing was received yet
    fn read(&self, channel: Channel) -> Option<f32>;

    /// Whether the peripheral currently reports itself connected
    fn link_connected(&self) -> bool;

    fn battery_level(&self) -> Option<f32> {
        self.read(Channel::Battery)
    }

    fn rssi(&self) -> Option<f32> {
        self.read(Channel::Rssi)
    }
}
