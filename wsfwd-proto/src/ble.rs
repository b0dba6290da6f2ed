//! Peripheral addressing and fixed frames
//!
//! The peripheral speaks a UART-over-GATT service: the node writes command
//! frames to the control characteristic. Readings come back through the
//! telemetry cache, never as a direct reply to a write.

/// UART service UUID
pub const SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// Control characteristic UUID (write)
pub const CONTROL_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// Standard GATT Battery Level characteristic (0x2A19)
pub const BATTERY_LEVEL_UUID: &str = "00002a19-0000-1000-8000-00805f9b34fb";

/// Frame asking the peripheral to refresh its battery reading
pub const BATTERY_REQUEST: [u8; 3] = [0xdd, 0xaa, 0xbb];

/// Name reported for the peripheral in `scan_result`
pub const DEVICE_NAME: &str = "collar";
