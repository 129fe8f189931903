//! SoftDevice central driver.
//!
//! A single task owns every SoftDevice central operation. It takes
//! `RadioRequest`s one at a time and reports outcomes as `StackEvent`s.
//! Long-running operations (scan, connect, the link itself) are raced
//! against the request queue so the gateway can always interrupt them:
//!
//! - **Scanning** runs until a scan or connect request arrives. Link
//!   requests that reach it are stale and dropped.
//! - **Connecting** runs until the link is up, fails, or `CancelConnect`.
//! - **Linked**: GATT notifications are pumped until the link drops;
//!   discovery, CCCD and value writes run alongside the pump.

use core::ops::ControlFlow;
use core::pin::pin;

use defmt::{debug, info, warn};
use embassy_futures::select::{select, Either};
use heapless::Vec;
use mbgate::ble::link::{
    AddressKind, CharacteristicHandle, ConnHandle, DisconnectReason, PeerAddress, RadioRequest,
    Role, ScanParams, StackEvent,
};
use mbgate::config::{self, EVENT_SERVICE_UUID128, NOTIFICATION_MAX_LEN};
use mbgate::error::BleError;
use mbgate::flow;
use mbgate::gateway::GatewayEvent;
use nrf_softdevice::ble::gatt_client::{self, Characteristic, Descriptor, DiscoverError, HvxType};
use nrf_softdevice::ble::{central, Address, AddressType, Connection, Uuid};
use nrf_softdevice::{raw, Softdevice};

use crate::{EventSender, ReportSender, RequestReceiver};

/// Client Characteristic Configuration descriptor.
const CCCD_UUID16: u16 = 0x2902;

/// CCCD value enabling notifications.
const CCCD_NOTIFY: [u8; 2] = [0x01, 0x00];

/// The event service exposes a handful of characteristics.
const MAX_CHARACTERISTICS: usize = 4;

/// GATT client for the micro:bit event service.
///
/// Implemented by hand rather than with `#[gatt_client]`: discovery must
/// report every characteristic of the service, found or not, and the
/// value handles are needed to match notifications.
pub struct EventServiceClient {
    characteristics: Vec<(u16, CharacteristicHandle), MAX_CHARACTERISTICS>,
}

/// A notification on one of the service's characteristics.
pub struct Notified {
    handle: u16,
    data: Vec<u8, NOTIFICATION_MAX_LEN>,
}

impl gatt_client::Client for EventServiceClient {
    type Event = Notified;

    fn on_hvx(
        &self,
        _conn: &Connection,
        type_: HvxType,
        handle: u16,
        data: &[u8],
    ) -> Option<Self::Event> {
        if !matches!(type_, HvxType::Notification) {
            return None;
        }
        let len = data.len().min(NOTIFICATION_MAX_LEN);
        let data = Vec::from_slice(&data[..len]).ok()?;
        Some(Notified { handle, data })
    }

    fn uuid() -> Uuid {
        Uuid::new_128(&EVENT_SERVICE_UUID128)
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self {
            characteristics: Vec::new(),
        }
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &Characteristic,
        descriptors: &[Descriptor],
    ) {
        let Some(uuid) = characteristic.uuid else {
            return;
        };
        let cccd = descriptors
            .iter()
            .find(|d| d.uuid == Some(Uuid::new_16(CCCD_UUID16)))
            .map(|d| d.handle);
        let handle = CharacteristicHandle {
            value: characteristic.handle_value,
            cccd,
        };
        if self.characteristics.push((uuid.as_raw().uuid, handle)).is_err() {
            warn!("event service: too many characteristics, ignoring the rest");
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        Ok(())
    }
}

/// Run the radio driver - must be spawned as a dedicated Embassy task.
///
/// Link outcomes go to `reports` and are never dropped. Advertisements
/// and notifications go to `events` and are dropped when it is full.
pub async fn run(
    sd: &'static Softdevice,
    requests: RequestReceiver,
    reports: ReportSender,
    events: EventSender,
) -> ! {
    info!("radio driver started");
    let mut pending: Option<RadioRequest> = None;

    loop {
        let request = match pending.take() {
            Some(request) => request,
            None => requests.receive().await,
        };

        pending = match request {
            RadioRequest::StartScan(params) => scan(sd, params, requests, reports, events).await,
            RadioRequest::Connect(peer) => {
                connect_and_serve(sd, peer, requests, reports, events).await
            }
            RadioRequest::StopScan | RadioRequest::CancelConnect => None,
            other => {
                debug!("no link, dropping {}", other);
                None
            }
        };
    }
}

/// Scan until a request ends it. Returns that request, unless it was
/// `StopScan`.
async fn scan(
    sd: &Softdevice,
    params: ScanParams,
    requests: RequestReceiver,
    reports: ReportSender,
    events: EventSender,
) -> Option<RadioRequest> {
    info!(
        "BLE scan starting (interval {} ms, window {} ms)",
        params.interval_ms, params.window_ms
    );

    let config = central::ScanConfig {
        // Active scan so names in scan responses are seen too.
        active: true,
        interval: ms_to_scan_units(params.interval_ms),
        window: ms_to_scan_units(params.window_ms),
        ..Default::default()
    };

    let mut scan = pin!(central::scan(sd, &config, |report| {
        let data =
            unsafe { core::slice::from_raw_parts(report.data.p_data, report.data.len as usize) };
        let Ok(data) = Vec::from_slice(data) else {
            return None;
        };
        let peer = peer_address(Address::from_raw(report.peer_addr));

        // We can't await inside this closure; drop the report if the
        // gateway is behind, the peripheral advertises again shortly.
        if events
            .try_send(GatewayEvent::Stack(StackEvent::Advertisement { peer, data }))
            .is_err()
        {
            debug!("event channel full - dropping advertisement");
        }
        None::<()>
    }));

    loop {
        match select(scan.as_mut(), requests.receive()).await {
            Either::First(_) => {
                warn!("BLE scan ended with error");
                reports
                    .send(StackEvent::RequestFailed(BleError::ScanFailed))
                    .await;
                return None;
            }
            Either::Second(request) if !request.ends_scan() => {
                debug!("scanning, dropping stale {}", request);
            }
            Either::Second(RadioRequest::StopScan) => return None,
            Either::Second(next) => return Some(next),
        }
    }
}

async fn connect_and_serve(
    sd: &Softdevice,
    peer: PeerAddress,
    requests: RequestReceiver,
    reports: ReportSender,
    events: EventSender,
) -> Option<RadioRequest> {
    info!("connecting to {}", peer);

    let address = sd_address(&peer);
    let whitelist = [&address];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    // The gateway stops scanning right after asking to connect; that
    // request has nothing left to stop.
    let interrupt = async {
        loop {
            match requests.receive().await {
                RadioRequest::StopScan => continue,
                other => break other,
            }
        }
    };

    let conn = match select(central::connect(sd, &conn_cfg), interrupt).await {
        Either::First(Ok(conn)) => conn,
        Either::First(Err(_)) => {
            warn!("connect to {} failed", peer);
            reports
                .send(StackEvent::ConnectFailed(BleError::ConnectFailed))
                .await;
            return None;
        }
        Either::Second(RadioRequest::CancelConnect) => {
            info!("connect cancelled");
            return None;
        }
        Either::Second(next) => return Some(next),
    };

    let Some(handle) = conn.handle() else {
        warn!("link dropped before it was reported");
        reports
            .send(StackEvent::ConnectFailed(BleError::ConnectFailed))
            .await;
        return None;
    };
    let handle = ConnHandle(handle);
    info!("link {} up", handle.0);
    reports
        .send(StackEvent::Connected {
            conn: handle,
            role: Role::Central,
        })
        .await;

    serve(&conn, handle, requests, reports, events).await
}

/// Pump notifications until the link goes down, performing link requests
/// alongside.
async fn serve(
    conn: &Connection,
    handle: ConnHandle,
    requests: RequestReceiver,
    reports: ReportSender,
    events: EventSender,
) -> Option<RadioRequest> {
    // Notifications only need `on_hvx`; discovery builds its own client.
    let client = <EventServiceClient as gatt_client::Client>::new_undiscovered(conn.clone());
    let pump = gatt_client::run(conn, &client, |notified: Notified| {
        let event = StackEvent::Notification {
            conn: handle,
            handle: notified.handle,
            data: notified.data,
        };
        // try_send avoids blocking; if the gateway is behind, we drop.
        if events.try_send(GatewayEvent::Stack(event)).is_err() {
            warn!("event channel full - dropping notification");
        }
    });

    let on_request = |request| perform(conn, handle, request, reports);
    match flow::pump_while(pump, requests, on_request).await {
        Either::First(_) => {
            info!("link {} closed", handle.0);
            reports
                .send(StackEvent::Disconnected {
                    conn: handle,
                    reason: DisconnectReason::Unknown,
                })
                .await;
            None
        }
        Either::Second(next) => next,
    }
}

/// Carry out one request on a live link. Breaks once the link is closed,
/// with the request that should run next, if any.
async fn perform(
    conn: &Connection,
    handle: ConnHandle,
    request: RadioRequest,
    reports: ReportSender,
) -> ControlFlow<Option<RadioRequest>> {
    match request {
        RadioRequest::Discover(c, _) if c == handle => {
            match gatt_client::discover::<EventServiceClient>(conn).await {
                Ok(found) => {
                    info!("event service: {} characteristics", found.characteristics.len());
                    for &(uuid16, characteristic) in found.characteristics.iter() {
                        reports
                            .send(StackEvent::CharacteristicDiscovered {
                                conn: handle,
                                uuid16,
                                handle: characteristic,
                            })
                            .await;
                    }
                }
                Err(_) => warn!("event service discovery failed"),
            }
            reports
                .send(StackEvent::DiscoveryComplete { conn: handle })
                .await;
        }
        RadioRequest::Subscribe(c, characteristic) if c == handle => {
            let result = match characteristic.cccd {
                Some(cccd) => gatt_client::write(conn, cccd, &CCCD_NOTIFY)
                    .await
                    .map_err(|_| BleError::NotifyFailed),
                None => Err(BleError::NotifyFailed),
            };
            match result {
                Ok(()) => info!("subscribed to event notifications"),
                Err(err) => reports.send(StackEvent::RequestFailed(err)).await,
            }
        }
        RadioRequest::Write(c, characteristic, data) if c == handle => {
            if gatt_client::write(conn, characteristic.value, &data).await.is_err() {
                reports
                    .send(StackEvent::RequestFailed(BleError::WriteFailed))
                    .await;
            }
        }
        RadioRequest::Disconnect(c, _) if c == handle => {
            close(conn, handle, reports).await;
            return ControlFlow::Break(None);
        }
        RadioRequest::StartScan(_) | RadioRequest::Connect(_) => {
            warn!("new radio cycle while linked, dropping link {}", handle.0);
            close(conn, handle, reports).await;
            return ControlFlow::Break(Some(request));
        }
        other => debug!("stale request {}", other),
    }
    ControlFlow::Continue(())
}

async fn close(conn: &Connection, handle: ConnHandle, reports: ReportSender) {
    let _ = conn.disconnect();
    reports
        .send(StackEvent::Disconnected {
            conn: handle,
            reason: DisconnectReason::LocalHostTerminated,
        })
        .await;
}

/// Milliseconds to SoftDevice scan timing units (0.625 ms).
fn ms_to_scan_units(ms: u16) -> u32 {
    u32::from(ms) * 8 / 5
}

fn peer_address(address: Address) -> PeerAddress {
    let kind = match address.address_type() {
        AddressType::Public => AddressKind::Public,
        AddressType::RandomStatic => AddressKind::RandomStatic,
        AddressType::RandomPrivateResolvable => AddressKind::RandomPrivateResolvable,
        AddressType::RandomPrivateNonResolvable => AddressKind::RandomPrivateNonResolvable,
        AddressType::Anonymous => AddressKind::Anonymous,
    };
    PeerAddress {
        kind,
        bytes: address.bytes(),
    }
}

fn sd_address(peer: &PeerAddress) -> Address {
    let address_type = match peer.kind {
        AddressKind::Public => AddressType::Public,
        AddressKind::RandomStatic => AddressType::RandomStatic,
        AddressKind::RandomPrivateResolvable => AddressType::RandomPrivateResolvable,
        AddressKind::RandomPrivateNonResolvable => AddressType::RandomPrivateNonResolvable,
        AddressKind::Anonymous => AddressType::Anonymous,
    };
    Address::new(address_type, peer.bytes)
}
