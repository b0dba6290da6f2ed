//! Recording collaborators for bridge tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wsfwd_mcu::{Channel, Clock, PeripheralLink, Telemetry, Transport};

use crate::Bridge;

pub type TestBridge = Bridge<MockLink, MockTelemetry, MockTransport, MockClock>;

struct Shared {
    now: Cell<u64>,
    sent: RefCell<Vec<String>>,
    writes: RefCell<Vec<Vec<u8>>>,
    enabled: Cell<Option<bool>>,
    link_connected: Cell<bool>,
    control_available: Cell<bool>,
    battery: Cell<Option<f32>>,
    rssi: Cell<Option<f32>>,
    transport_down: Cell<bool>,
}

/// Test-side handle onto everything the mocks observe and report
pub struct Harness(Rc<Shared>);

impl Harness {
    pub fn new() -> Self {
        Self(Rc::new(Shared {
            now: Cell::new(0),
            sent: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
            enabled: Cell::new(None),
            link_connected: Cell::new(false),
            control_available: Cell::new(true),
            battery: Cell::new(None),
            rssi: Cell::new(None),
            transport_down: Cell::new(false),
        }))
    }

    pub fn link(&self) -> MockLink {
        MockLink(self.0.clone())
    }

    pub fn telemetry(&self) -> MockTelemetry {
        MockTelemetry(self.0.clone())
    }

    pub fn transport(&self) -> MockTransport {
        MockTransport(self.0.clone())
    }

    pub fn clock(&self) -> MockClock {
        MockClock(self.0.clone())
    }

    pub fn set_now(&self, ms: u64) {
        self.0.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.now.set(self.0.now.get() + ms);
    }

    /// Messages sent since the last call
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.sent.borrow_mut())
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0.writes.borrow().clone()
    }

    /// Last value passed to `set_enabled`
    pub fn enabled(&self) -> Option<bool> {
        self.0.enabled.get()
    }

    pub fn set_link_connected(&self, connected: bool) {
        self.0.link_connected.set(connected);
    }

    pub fn set_control_available(&self, available: bool) {
        self.0.control_available.set(available);
    }

    pub fn set_battery(&self, level: Option<f32>) {
        self.0.battery.set(level);
    }

    pub fn set_rssi(&self, rssi: Option<f32>) {
        self.0.rssi.set(rssi);
    }

    pub fn set_transport_down(&self, down: bool) {
        self.0.transport_down.set(down);
    }
}

pub struct MockLink(Rc<Shared>);

impl PeripheralLink for MockLink {
    fn write(&mut self, data: &[u8]) -> bool {
        if !self.0.control_available.get() {
            return false;
        }
        self.0.writes.borrow_mut().push(data.to_vec());
        true
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.0.enabled.set(Some(enabled));
    }
}

pub struct MockTelemetry(Rc<Shared>);

impl Telemetry for MockTelemetry {
    fn read(&self, channel: Channel) -> Option<f32> {
        match channel {
            Channel::Battery => self.0.battery.get(),
            Channel::Rssi => self.0.rssi.get(),
        }
    }

    fn link_connected(&self) -> bool {
        self.0.link_connected.get()
    }
}

pub struct MockTransport(Rc<Shared>);

impl Transport for MockTransport {
    type Error = &'static str;

    fn send_text(&mut self, text: &str) -> Result<(), Self::Error> {
        if self.0.transport_down.get() {
            return Err("transport down");
        }
        self.0.sent.borrow_mut().push(text.to_string());
        Ok(())
    }
}

pub struct MockClock(Rc<Shared>);

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.0.now.get()
    }
}
