//! Bridge core: auth lifecycle, message dispatch and the poll hook

use log::*;
use wsfwd_mcu::{Clock, PeripheralLink, Telemetry, Transport};
use wsfwd_proto::{ble, decode_hex, encode_hex, Inbound, Outbound, ParseError, ScanDevice};

use crate::config::{BridgeConfig, ConfigError, Credentials, Endpoint};
use crate::session::{BatteryRequest, LinkState, Session};

/// Protocol bridge between the controller transport and the peripheral.
///
/// Everything runs from one control flow: the host feeds transport events
/// into `on_connected` / `on_disconnected` / `on_text` and calls `poll`
/// continuously. None of these block.
pub struct Bridge<L, T, X, C> {
    endpoint: Endpoint,
    credentials: Credentials,
    link: L,
    telemetry: T,
    transport: X,
    clock: C,
    session: Session,
}

impl<L, T, X, C> Bridge<L, T, X, C>
where
    L: PeripheralLink,
    T: Telemetry,
    X: Transport,
    C: Clock,
{
    /// Build a bridge from config. Fails if the server URL is malformed.
    pub fn new(
        config: &BridgeConfig,
        link: L,
        telemetry: T,
        transport: X,
        clock: C,
    ) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint().inspect_err(|e| {
            error!("{e}");
        })?;

        Ok(Self {
            endpoint,
            credentials: config.credentials(),
            link,
            telemetry,
            transport,
            clock,
            session: Session::new(),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> LinkState {
        self.session.state()
    }

    pub fn battery_pending(&self) -> bool {
        self.session.battery_pending()
    }

    pub fn dump_config(&self) {
        info!("WebSocket forwarder:");
        info!("  Server: {}:{}{}", self.endpoint.host, self.endpoint.port, self.endpoint.path);
        info!("  Node ID: {}", self.credentials.node_id);
    }

    // =========================================================================
    // Transport events
    // =========================================================================

    pub fn on_connected(&mut self) {
        info!("Connected to server");
        self.session.connected();
        self.send(Outbound::Auth {
            token: self.credentials.token.clone(),
            node_id: self.credentials.node_id.clone(),
        });
    }

    pub fn on_disconnected(&mut self) {
        warn!("Disconnected from server");
        if self.session.disconnected() {
            debug!("Dropped pending battery read");
        }
    }

    pub fn on_text(&mut self, text: &str) {
        match Inbound::parse(text) {
            Ok(msg) => self.dispatch(msg),
            Err(ParseError::Json(e)) => warn!("JSON parse error: {e}"),
            Err(e) => debug!("Dropping message: {e}"),
        }
    }

    // =========================================================================
    // Scheduler hook
    // =========================================================================

    /// Drive periodic status and deferred completions. Call every loop
    /// iteration.
    pub fn poll(&mut self) {
        let now = self.clock.now_ms();

        if self.session.take_status_due(now) {
            self.send_status();
        }

        if self.session.take_battery_ready(now) {
            let level = as_int(self.telemetry.battery_level());
            self.send(Outbound::Battery { level });
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn dispatch(&mut self, msg: Inbound) {
        match msg {
            Inbound::AuthResult { success: true } => {
                info!("Authenticated successfully");
                self.session.authenticated(self.clock.now_ms());
                self.send_status();
            }
            Inbound::AuthResult { success: false } => {
                error!("Authentication failed");
            }
            Inbound::Command { id, data } => self.handle_command(id, data.as_deref()),
            Inbound::GetBattery => self.request_battery(),
            Inbound::GetRssi => {
                let value = as_int(self.telemetry.rssi());
                self.send(Outbound::Rssi { value });
            }
            Inbound::Scan => {
                let devices = self
                    .telemetry
                    .rssi()
                    .filter(|rssi| !rssi.is_nan())
                    .map(|rssi| ScanDevice {
                        name: ble::DEVICE_NAME.to_string(),
                        rssi: rssi as i32,
                    })
                    .into_iter()
                    .collect();
                self.send(Outbound::ScanResult { devices });
            }
            Inbound::Connect => {
                info!("Server requested BLE connect");
                self.link.set_enabled(true);
            }
            Inbound::DisconnectBle => {
                info!("Server requested BLE disconnect");
                self.link.set_enabled(false);
            }
            // parse() never hands these out
            Inbound::Unknown => {}
        }
    }

    fn handle_command(&mut self, id: i64, data: Option<&str>) {
        let Some(hex) = data else {
            warn!("Command {id} has no data");
            self.send(Outbound::command_result(id, false));
            return;
        };

        let frame = decode_hex(hex);

        let success = if !self.telemetry.link_connected() {
            warn!("Command {id} rejected: peripheral not connected");
            false
        } else if self.link.write(&frame) {
            debug!("Command {id} -> {}", encode_hex(&frame));
            true
        } else {
            warn!("Command {id} failed: control characteristic not found");
            false
        };

        self.send(Outbound::command_result(id, success));
    }

    /// Trigger a battery refresh now, answer from `poll` once it settled
    fn request_battery(&mut self) {
        if !self.link.write(&ble::BATTERY_REQUEST) {
            warn!("Battery request not written: control characteristic not found");
        }

        if self.session.begin_battery_read(self.clock.now_ms()) == BatteryRequest::Restarted {
            debug!("Battery read already pending, restarting settle timer");
        }
    }

    fn send_status(&mut self) {
        let status = Outbound::Status {
            ble_connected: self.telemetry.link_connected(),
            battery: as_int(self.telemetry.battery_level()),
        };
        self.send(status);
    }

    fn send(&mut self, msg: Outbound) {
        let text = match msg.to_text() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize {msg:?}: {e}");
                return;
            }
        };

        if let Err(e) = self.transport.send_text(&text) {
            warn!("Send failed: {e:?}");
        }
    }
}

/// Sensor values are floats; the wire carries them truncated. Missing and
/// NaN readings go out as 0.
fn as_int(value: Option<f32>) -> i32 {
    value.map(|v| v as i32).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{BATTERY_SETTLE_MS, STATUS_INTERVAL_MS};
    use crate::testing::*;

    fn bridge() -> (TestBridge, Harness) {
        let harness = Harness::new();
        let config = BridgeConfig {
            server_url: "ws://controller.local:8080/ws/node".to_string(),
            token: "secret".to_string(),
            ..Default::default()
        };
        let bridge = Bridge::new(
            &config,
            harness.link(),
            harness.telemetry(),
            harness.transport(),
            harness.clock(),
        )
        .unwrap();
        (bridge, harness)
    }

    fn authenticated() -> (TestBridge, Harness) {
        let (mut b, h) = bridge();
        b.on_connected();
        b.on_text(r#"{"type":"auth_result","success":true}"#);
        h.take_sent();
        (b, h)
    }

    #[test]
    fn malformed_url_fails_setup() {
        let h = Harness::new();
        let config = BridgeConfig {
            server_url: "ws://controller.local/ws".to_string(),
            ..Default::default()
        };
        let result = Bridge::new(&config, h.link(), h.telemetry(), h.transport(), h.clock());
        assert!(matches!(result, Err(ConfigError::MissingPort(_))));
    }

    #[test]
    fn connect_sends_auth() {
        let (mut b, h) = bridge();
        b.on_connected();
        assert_eq!(b.state(), LinkState::Connected);
        assert_eq!(
            h.take_sent(),
            vec![r#"{"type":"auth","token":"secret","nodeId":"esp32-ble-bridge"}"#]
        );
    }

    #[test]
    fn auth_success_emits_one_status_then_periodic() {
        let (mut b, h) = bridge();
        h.set_battery(Some(87.6));
        h.set_link_connected(true);
        h.set_now(3_000);
        b.on_connected();
        h.take_sent();

        b.on_text(r#"{"type":"auth_result","success":true}"#);
        assert_eq!(b.state(), LinkState::Authenticated);
        assert_eq!(
            h.take_sent(),
            vec![r#"{"type":"status","bleConnected":true,"battery":87}"#]
        );

        b.poll();
        h.advance(STATUS_INTERVAL_MS - 1);
        b.poll();
        assert!(h.take_sent().is_empty());

        h.advance(1);
        b.poll();
        b.poll();
        assert_eq!(h.take_sent().len(), 1);

        h.advance(STATUS_INTERVAL_MS / 2);
        b.poll();
        assert!(h.take_sent().is_empty());
        h.advance(STATUS_INTERVAL_MS / 2 + 250);
        b.poll();
        assert_eq!(h.take_sent().len(), 1);
    }

    #[test]
    fn failed_auth_changes_nothing() {
        let (mut b, h) = bridge();
        b.on_connected();
        h.take_sent();

        b.on_text(r#"{"type":"auth_result","success":false}"#);
        assert_eq!(b.state(), LinkState::Connected);
        h.advance(STATUS_INTERVAL_MS * 3);
        b.poll();
        assert!(h.take_sent().is_empty());
    }

    #[test]
    fn command_without_data_fails() {
        let (mut b, h) = authenticated();
        h.set_link_connected(true);
        b.on_text(r#"{"type":"command","id":7}"#);
        assert_eq!(h.take_sent(), vec![r#"{"type":"command_result","id":7,"success":false}"#]);
        assert!(h.writes().is_empty());
    }

    #[test]
    fn command_defaults_id_to_zero() {
        let (mut b, h) = authenticated();
        b.on_text(r#"{"type":"command"}"#);
        assert_eq!(h.take_sent(), vec![r#"{"type":"command_result","id":0,"success":false}"#]);
    }

    #[test]
    fn command_while_peripheral_disconnected_fails_without_write() {
        let (mut b, h) = authenticated();
        h.set_link_connected(false);
        b.on_text(r#"{"type":"command","id":3,"data":"dead"}"#);
        assert_eq!(h.take_sent(), vec![r#"{"type":"command_result","id":3,"success":false}"#]);
        assert!(h.writes().is_empty());
    }

    #[test]
    fn command_forwards_decoded_frame() {
        let (mut b, h) = authenticated();
        h.set_link_connected(true);
        b.on_text(r#"{"type":"command","id":12,"data":"A1b2c"}"#);
        assert_eq!(h.writes(), vec![vec![0xa1, 0xb2]]);
        assert_eq!(h.take_sent(), vec![r#"{"type":"command_result","id":12,"success":true}"#]);
    }

    #[test]
    fn command_reports_missing_characteristic() {
        let (mut b, h) = authenticated();
        h.set_link_connected(true);
        h.set_control_available(false);
        b.on_text(r#"{"type":"command","id":4,"data":"00"}"#);
        assert!(h.writes().is_empty());
        assert_eq!(h.take_sent(), vec![r#"{"type":"command_result","id":4,"success":false}"#]);
    }

    #[test]
    fn commands_are_handled_before_auth() {
        let (mut b, h) = bridge();
        h.set_link_connected(true);
        b.on_text(r#"{"type":"command","id":1,"data":"01"}"#);
        assert_eq!(h.take_sent(), vec![r#"{"type":"command_result","id":1,"success":true}"#]);
    }

    #[test]
    fn battery_is_deferred_until_settled() {
        let (mut b, h) = authenticated();
        h.set_battery(Some(40.0));

        b.on_text(r#"{"type":"get_battery"}"#);
        assert_eq!(h.writes(), vec![ble::BATTERY_REQUEST.to_vec()]);
        assert!(h.take_sent().is_empty());
        assert!(b.battery_pending());

        h.advance(BATTERY_SETTLE_MS - 1);
        b.poll();
        assert!(h.take_sent().is_empty());

        // the peripheral answered in the meantime
        h.set_battery(Some(55.0));
        h.advance(1);
        b.poll();
        assert_eq!(h.take_sent(), vec![r#"{"type":"battery","level":55}"#]);

        h.advance(BATTERY_SETTLE_MS);
        b.poll();
        assert!(h.take_sent().is_empty());
        assert!(!b.battery_pending());
    }

    #[test]
    fn duplicate_battery_request_coalesces() {
        let (mut b, h) = authenticated();
        b.on_text(r#"{"type":"get_battery"}"#);
        h.advance(600);
        b.on_text(r#"{"type":"get_battery"}"#);
        assert_eq!(h.writes().len(), 2);

        h.advance(600);
        b.poll();
        assert!(h.take_sent().is_empty());

        h.advance(BATTERY_SETTLE_MS);
        b.poll();
        b.poll();
        assert_eq!(h.take_sent(), vec![r#"{"type":"battery","level":0}"#]);
    }

    #[test]
    fn battery_still_deferred_when_trigger_not_written() {
        let (mut b, h) = authenticated();
        h.set_control_available(false);
        h.set_battery(Some(12.0));
        b.on_text(r#"{"type":"get_battery"}"#);
        h.advance(BATTERY_SETTLE_MS);
        b.poll();
        assert_eq!(h.take_sent(), vec![r#"{"type":"battery","level":12}"#]);
    }

    #[test]
    fn disconnect_resets_auth_and_cancels_battery() {
        let (mut b, h) = authenticated();
        b.on_text(r#"{"type":"get_battery"}"#);

        b.on_disconnected();
        assert_eq!(b.state(), LinkState::Disconnected);
        assert!(!b.battery_pending());

        h.advance(STATUS_INTERVAL_MS * 2);
        b.poll();
        assert!(h.take_sent().is_empty());

        b.on_connected();
        b.on_text(r#"{"type":"auth_result","success":true}"#);
        let sent = h.take_sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with(r#"{"type":"auth""#));
        assert!(sent[1].starts_with(r#"{"type":"status""#));
    }

    #[test]
    fn rssi_and_scan_report_cache() {
        let (mut b, h) = authenticated();
        b.on_text(r#"{"type":"scan"}"#);
        b.on_text(r#"{"type":"get_rssi"}"#);
        assert_eq!(
            h.take_sent(),
            vec![r#"{"type":"scan_result","devices":[]}"#, r#"{"type":"rssi","value":0}"#]
        );

        h.set_rssi(Some(-71.5));
        b.on_text(r#"{"type":"scan"}"#);
        b.on_text(r#"{"type":"get_rssi"}"#);
        assert_eq!(
            h.take_sent(),
            vec![
                r#"{"type":"scan_result","devices":[{"name":"collar","rssi":-71}]}"#,
                r#"{"type":"rssi","value":-71}"#,
            ]
        );

        h.set_rssi(Some(f32::NAN));
        b.on_text(r#"{"type":"scan"}"#);
        assert_eq!(h.take_sent(), vec![r#"{"type":"scan_result","devices":[]}"#]);
    }

    #[test]
    fn connect_and_disconnect_ble_toggle_link() {
        let (mut b, h) = authenticated();
        b.on_text(r#"{"type":"disconnect_ble"}"#);
        assert_eq!(h.enabled(), Some(false));
        b.on_text(r#"{"type":"connect"}"#);
        assert_eq!(h.enabled(), Some(true));
        assert!(h.take_sent().is_empty());
    }

    #[test]
    fn garbage_is_dropped_silently() {
        let (mut b, h) = authenticated();
        for text in ["", "{", "null", r#"{"success":true}"#, r#"{"type":"reboot"}"#, r#"{"type":null}"#] {
            b.on_text(text);
        }
        assert!(h.take_sent().is_empty());
        assert!(h.writes().is_empty());
        assert_eq!(b.state(), LinkState::Authenticated);
    }

    #[test]
    fn send_errors_are_not_fatal() {
        let (mut b, h) = authenticated();
        h.set_transport_down(true);
        b.on_text(r#"{"type":"get_rssi"}"#);
        assert!(h.take_sent().is_empty());

        h.set_transport_down(false);
        b.on_text(r#"{"type":"get_rssi"}"#);
        assert_eq!(h.take_sent().len(), 1);
    }
}
