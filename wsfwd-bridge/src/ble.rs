//! BLE peripheral link over btleplug
//!
//! A worker task owns connection management: it scans for the peripheral,
//! connects, and refreshes the telemetry cache. The bridge side only reads
//! that cache and spawns writes, so neither call waits on the radio.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use btleplug::api::{Central, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::*;
use uuid::Uuid;
use wsfwd_node::{Channel, PeripheralLink, Telemetry};
use wsfwd_proto::ble::{BATTERY_LEVEL_UUID, CONTROL_UUID, SERVICE_UUID};
use wsfwd_proto::encode_hex;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);
const SCAN_WINDOW: Duration = Duration::from_secs(3);

/// Parse UUID string into uuid::Uuid
fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("invalid UUID in wsfwd_proto")
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> anyhow::Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().context("No Bluetooth adapter found")
}

struct LinkShared {
    enabled: bool,
    peripheral: Option<Peripheral>,
    connected: bool,
    battery: Option<f32>,
    rssi: Option<f32>,
}

/// Shared handle onto the peripheral connection and its telemetry cache
#[derive(Clone)]
pub struct BleLink {
    shared: Arc<Mutex<LinkShared>>,
}

impl Default for BleLink {
    fn default() -> Self {
        Self::new()
    }
}

impl BleLink {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(LinkShared {
                enabled: true,
                peripheral: None,
                connected: false,
                battery: None,
                rssi: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Connection management loop. Runs until the task is dropped.
    pub async fn run(self, adapter: Adapter, device_name: String) {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = self.step(&adapter, &device_name).await {
                warn!("BLE error: {e}");
            }
        }
    }

    async fn step(&self, adapter: &Adapter, device_name: &str) -> Result<(), btleplug::Error> {
        let (enabled, current) = {
            let shared = self.lock();
            (shared.enabled, shared.peripheral.clone())
        };

        match (enabled, current) {
            (true, Some(peripheral)) => {
                if peripheral.is_connected().await? {
                    self.refresh(&peripheral).await?;
                } else {
                    warn!("Peripheral connection lost");
                    self.forget();
                }
            }
            (true, None) => {
                if let Some(peripheral) = find_peripheral(adapter, device_name).await? {
                    peripheral.connect().await?;
                    peripheral.discover_services().await?;
                    info!("Connected to peripheral {}", peripheral.address());
                    {
                        let mut shared = self.lock();
                        shared.peripheral = Some(peripheral.clone());
                        shared.connected = true;
                    }
                    self.refresh(&peripheral).await?;
                }
            }
            (false, Some(peripheral)) => {
                info!("Disconnecting peripheral {}", peripheral.address());
                self.forget();
                peripheral.disconnect().await?;
            }
            (false, None) => {}
        }
        Ok(())
    }

    fn forget(&self) {
        let mut shared = self.lock();
        shared.peripheral = None;
        shared.connected = false;
    }

    async fn refresh(&self, peripheral: &Peripheral) -> Result<(), btleplug::Error> {
        let rssi = peripheral
            .properties()
            .await?
            .and_then(|props| props.rssi)
            .map(f32::from);

        let battery_uuid = parse_uuid(BATTERY_LEVEL_UUID);
        let battery_chr = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == battery_uuid);
        let battery = match battery_chr {
            Some(chr) => peripheral.read(&chr).await?.first().map(|&b| f32::from(b)),
            None => None,
        };

        let mut shared = self.lock();
        shared.connected = true;
        if rssi.is_some() {
            shared.rssi = rssi;
        }
        if battery.is_some() {
            shared.battery = battery;
        }
        Ok(())
    }
}

impl PeripheralLink for BleLink {
    fn write(&mut self, data: &[u8]) -> bool {
        let Some(peripheral) = self.lock().peripheral.clone() else {
            return false;
        };

        let service = parse_uuid(SERVICE_UUID);
        let control = parse_uuid(CONTROL_UUID);
        let Some(chr) = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == control)
        else {
            return false;
        };

        let write_type = if chr.properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };

        let data = data.to_vec();
        tokio::spawn(async move {
            if let Err(e) = peripheral.write(&chr, &data, write_type).await {
                warn!("BLE write of {} failed: {e}", encode_hex(&data));
            }
        });
        true
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.lock().enabled = enabled;
    }
}

impl Telemetry for BleLink {
    fn read(&self, channel: Channel) -> Option<f32> {
        let shared = self.lock();
        match channel {
            Channel::Battery => shared.battery,
            Channel::Rssi => shared.rssi,
        }
    }

    fn link_connected(&self) -> bool {
        self.lock().connected
    }
}

/// Scan for a peripheral whose advertised name contains `device_name`
async fn find_peripheral(
    adapter: &Adapter,
    device_name: &str,
) -> Result<Option<Peripheral>, btleplug::Error> {
    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(SCAN_WINDOW).await;

    let mut found = None;
    for peripheral in adapter.peripherals().await? {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_default();
            if name.contains(device_name) {
                debug!("Found {} ({})", name, peripheral.address());
                found = Some(peripheral);
                break;
            }
        }
    }

    adapter.stop_scan().await?;
    Ok(found)
}
