//! Connection lifecycle state machine.
//!
//! [`Gateway`] is the one context object of the firmware: it owns the target
//! identity, the discovered handles, the connection state and the three
//! collaborators ([`Radio`], [`HostLink`], [`Indicator`]). Every input reaches
//! it as a [`GatewayEvent`] through [`Gateway::handle`], and each call runs to
//! completion before the next one starts.
//!
//! ```text
//!   Idle ──(target known / override)──► Scanning ──(match)──► Connecting
//!                                          ▲                       │
//!                                          │                  Connected
//!                                   Disconnected                   ▼
//!   Ready ◄──(both handles)── Discovering ◄────────────────────────┘
//! ```
//!
//! Every failure (missing characteristics, lost link, retarget) funnels
//! through a disconnect, and every disconnect restarts the scan cycle.

mod dispatch;
mod relay;

use core::fmt::Write;

use heapless::{String, Vec};

use crate::ble::adv_filter::{self, Verdict};
use crate::ble::link::{
    CharacteristicHandle, ConnHandle, DisconnectReason, PeerAddress, Radio, Role, ScanParams,
    StackEvent,
};
use crate::config::{
    CONSOLE_CHUNK_MAX, DIAGNOSTIC_CODE, EVENT_SERVICE_UUID16, EVENT_SINK_UUID16,
    EVENT_SOURCE_UUID16, OUT_LINE_MAX, SCAN_INTERVAL_MS, SCAN_WINDOW_MS,
};
use crate::error::BleError;
use crate::identity::{DeviceId, Identity};
use crate::line::{HostLink, LineFramer};
use crate::ui::{Indicator, Status};

/// Scan parameters used for every scan cycle.
pub const SCAN_PARAMS: ScanParams = ScanParams {
    interval_ms: SCAN_INTERVAL_MS,
    window_ms: SCAN_WINDOW_MS,
};

/// Connection lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Waiting for a target identifier or the user override.
    Idle,
    Scanning,
    /// A connect request is outstanding.
    Connecting,
    Discovering,
    /// Subscribed and relaying events.
    Ready,
    /// Link teardown requested or observed.
    Disconnecting,
}

/// Everything that can wake the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GatewayEvent {
    Stack(StackEvent),
    /// Raw bytes from the host console.
    Console(Vec<u8, CONSOLE_CHUNK_MAX>),
    /// User asked to connect to the first micro:bit seen.
    Override,
}

pub struct Gateway<R, H, I> {
    radio: R,
    host: H,
    indicator: I,
    state: ConnectionState,
    identity: Identity,
    conn: Option<ConnHandle>,
    source: Option<CharacteristicHandle>,
    sink: Option<CharacteristicHandle>,
    framer: LineFramer,
}

impl<R: Radio, H: HostLink, I: Indicator> Gateway<R, H, I> {
    pub fn new(radio: R, host: H, indicator: I) -> Self {
        Self {
            radio,
            host,
            indicator,
            state: ConnectionState::Idle,
            identity: Identity::new(),
            conn: None,
            source: None,
            sink: None,
            framer: LineFramer::new(),
        }
    }

    /// Surface the awaiting status, or start scanning straight away if a
    /// target is already known.
    pub fn start(&mut self) {
        self.indicator.show(Status::AwaitingTarget);
        if self.identity.is_set() {
            self.start_scan_cycle();
        }
    }

    /// Route one event to its handler.
    pub fn handle(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Stack(event) => self.handle_stack(event),
            GatewayEvent::Console(bytes) => self.handle_console(&bytes),
            GatewayEvent::Override => self.handle_override(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> Option<DeviceId> {
        self.identity.get()
    }

    pub fn source_found(&self) -> bool {
        self.source.is_some()
    }

    pub fn sink_found(&self) -> bool {
        self.sink.is_some()
    }

    pub fn connection(&self) -> Option<ConnHandle> {
        self.conn
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    fn handle_stack(&mut self, event: StackEvent) {
        match event {
            StackEvent::Advertisement { peer, data } => self.on_advertisement(peer, &data),
            StackEvent::Connected { conn, role } => self.on_connected(conn, role),
            StackEvent::ConnectFailed(err) => self.on_connect_failed(err),
            StackEvent::Disconnected { conn, reason } => self.on_disconnected(conn, reason),
            StackEvent::CharacteristicDiscovered {
                conn,
                uuid16,
                handle,
            } => self.on_characteristic(conn, uuid16, handle),
            StackEvent::DiscoveryComplete { conn } => self.on_discovery_complete(conn),
            StackEvent::Notification { conn, handle, data } => self.relay(conn, handle, &data),
            StackEvent::RequestFailed(err) => {
                warn!("radio request failed: {}", err);
                self.diagnostic(format_args!("ERROR: {}", err));
            }
        }
    }

    fn handle_override(&mut self) {
        if self.state == ConnectionState::Idle {
            info!("override: accepting the first micro:bit seen");
            self.start_scan_cycle();
        }
    }

    /// Reset per-connection state and (re)start scanning.
    fn start_scan_cycle(&mut self) {
        self.conn = None;
        self.source = None;
        self.sink = None;
        self.state = ConnectionState::Scanning;
        self.indicator.show(Status::Scanning);
        if let Err(err) = self.radio.start_scan(SCAN_PARAMS) {
            warn!("scan request failed: {}", err);
            self.diagnostic(format_args!("ERROR: scan request returned: {}", err));
        }
    }

    fn on_advertisement(&mut self, peer: PeerAddress, data: &[u8]) {
        if self.state != ConnectionState::Scanning {
            return;
        }
        match adv_filter::evaluate(data, self.identity.get()) {
            Verdict::Ignore => {}
            Verdict::Adopt(id) => {
                self.identity.adopt(id);
                info!("adopted target {}", id);
                self.diagnostic(format_args!("Set device to '{}'", id));
                self.request_connect(peer);
            }
            Verdict::Connect => self.request_connect(peer),
        }
    }

    fn request_connect(&mut self, peer: PeerAddress) {
        if let Some(id) = self.identity.get() {
            self.diagnostic(format_args!("Found microbit {}", id));
        }
        match self.radio.connect(peer) {
            Ok(()) => {
                if let Err(err) = self.radio.stop_scan() {
                    warn!("stop scan failed: {}", err);
                }
                self.state = ConnectionState::Connecting;
            }
            // Scanning stays active; the next advertisement retries.
            Err(err) => debug!("connect request refused: {}", err),
        }
    }

    fn on_connected(&mut self, conn: ConnHandle, role: Role) {
        if role != Role::Central {
            return;
        }
        if self.state != ConnectionState::Connecting {
            warn!("unexpected link {}, dropping it", conn.0);
            if let Err(err) = self
                .radio
                .disconnect(conn, DisconnectReason::RemoteUserTerminated)
            {
                warn!("disconnect request failed: {}", err);
            }
            return;
        }

        self.conn = Some(conn);
        self.state = ConnectionState::Discovering;
        self.indicator.show(Status::Discovering);
        if let Some(id) = self.identity.get() {
            self.diagnostic(format_args!("Connected to {}", id));
        }

        if let Err(err) = self.radio.discover(conn, EVENT_SERVICE_UUID16) {
            warn!("discovery request failed: {}", err);
            self.drop_link(conn);
        }
    }

    fn on_connect_failed(&mut self, err: BleError) {
        if self.state != ConnectionState::Connecting {
            return;
        }
        warn!("connect failed: {}", err);
        self.diagnostic(format_args!("ERROR: {}", err));
        self.start_scan_cycle();
    }

    fn on_characteristic(&mut self, conn: ConnHandle, uuid16: u16, handle: CharacteristicHandle) {
        if self.state != ConnectionState::Discovering || self.conn != Some(conn) {
            return;
        }
        match uuid16 {
            EVENT_SOURCE_UUID16 => self.source = Some(handle),
            EVENT_SINK_UUID16 => self.sink = Some(handle),
            _ => {}
        }
    }

    fn on_discovery_complete(&mut self, conn: ConnHandle) {
        if self.state != ConnectionState::Discovering || self.conn != Some(conn) {
            return;
        }

        let (Some(source), Some(_)) = (self.source, self.sink) else {
            info!("event service incomplete, dropping link");
            self.drop_link(conn);
            return;
        };

        if let Err(err) = self.radio.subscribe(conn, source) {
            warn!("notification request failed: {}", err);
            self.diagnostic(format_args!("ERROR: Notification request returned: {}", err));
        }
        self.state = ConnectionState::Ready;
        self.indicator.show(Status::Connected);
    }

    fn on_disconnected(&mut self, conn: ConnHandle, reason: DisconnectReason) {
        if self.conn != Some(conn) {
            return;
        }
        info!("link {} down: {}", conn.0, reason);
        self.state = ConnectionState::Disconnecting;
        self.start_scan_cycle();
    }

    /// Tear the link down; the resulting disconnection restarts scanning.
    fn drop_link(&mut self, conn: ConnHandle) {
        self.state = ConnectionState::Disconnecting;
        if let Err(err) = self
            .radio
            .disconnect(conn, DisconnectReason::RemoteUserTerminated)
        {
            warn!("disconnect request failed: {}", err);
        }
    }

    /// Write a `D ` line to the host.
    fn diagnostic(&mut self, args: core::fmt::Arguments<'_>) {
        let mut line: String<OUT_LINE_MAX> = String::new();
        let _ = write!(line, "{} ", DIAGNOSTIC_CODE);
        let _ = line.write_fmt(args);
        self.host.write_line(&line);
    }
}
