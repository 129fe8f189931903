//! The radio seam between the gateway core and the wireless stack.
//!
//! The gateway drives the stack through [`Radio`] and hears back through
//! [`StackEvent`]s. Requests are fire-and-forget: a synchronous `Err` means
//! the stack refused the request outright, later failures arrive as events.

use heapless::Vec;

use crate::config::{ADV_DATA_MAX, GATT_WRITE_MAX, NOTIFICATION_MAX_LEN};
use crate::error::BleError;

/// BLE address type, as carried in an advertising report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKind {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
    Anonymous,
}

/// Address of an advertising peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress {
    pub kind: AddressKind,
    pub bytes: [u8; 6],
}

/// Stack handle of an established link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

/// Which side of the link we are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Central,
    Peripheral,
}

/// Scan timing, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    pub interval_ms: u16,
    pub window_ms: u16,
}

/// A remote characteristic found during discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicHandle {
    /// Attribute handle of the characteristic value.
    pub value: u16,
    /// Client Characteristic Configuration descriptor, if the peer has one.
    pub cccd: Option<u16>,
}

/// HCI disconnect reasons the gateway distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectReason {
    RemoteUserTerminated,
    LocalHostTerminated,
    ConnectionTimeout,
    Other(u8),
    Unknown,
}

impl DisconnectReason {
    pub fn from_hci(code: u8) -> Self {
        match code {
            0x13 => DisconnectReason::RemoteUserTerminated,
            0x16 => DisconnectReason::LocalHostTerminated,
            0x08 => DisconnectReason::ConnectionTimeout,
            other => DisconnectReason::Other(other),
        }
    }
}

/// Everything the wireless stack can tell the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackEvent {
    /// An advertising or scan response report.
    Advertisement {
        peer: PeerAddress,
        data: Vec<u8, ADV_DATA_MAX>,
    },
    /// A link came up.
    Connected { conn: ConnHandle, role: Role },
    /// An accepted connect request did not produce a link.
    ConnectFailed(BleError),
    /// A link went down, for whatever reason.
    Disconnected {
        conn: ConnHandle,
        reason: DisconnectReason,
    },
    /// One characteristic of the requested service.
    CharacteristicDiscovered {
        conn: ConnHandle,
        uuid16: u16,
        handle: CharacteristicHandle,
    },
    /// Service discovery finished (successfully or not).
    DiscoveryComplete { conn: ConnHandle },
    /// A notification from the peer; `handle` is the value handle.
    Notification {
        conn: ConnHandle,
        handle: u16,
        data: Vec<u8, NOTIFICATION_MAX_LEN>,
    },
    /// A previously accepted subscribe or write request failed.
    RequestFailed(BleError),
}

/// Operations the gateway needs from the wireless stack.
pub trait Radio {
    fn start_scan(&mut self, params: ScanParams) -> Result<(), BleError>;

    fn stop_scan(&mut self) -> Result<(), BleError>;

    /// Connect to `peer`. Success means the request was accepted; the
    /// outcome arrives as `Connected` or `ConnectFailed`.
    fn connect(&mut self, peer: PeerAddress) -> Result<(), BleError>;

    /// Abandon a pending connect request.
    fn cancel_connect(&mut self) -> Result<(), BleError>;

    fn disconnect(&mut self, conn: ConnHandle, reason: DisconnectReason) -> Result<(), BleError>;

    /// Discover the characteristics of the service with this 16-bit alias.
    fn discover(&mut self, conn: ConnHandle, service_uuid16: u16) -> Result<(), BleError>;

    /// Enable notifications on `handle`.
    fn subscribe(&mut self, conn: ConnHandle, handle: CharacteristicHandle)
        -> Result<(), BleError>;

    fn write(
        &mut self,
        conn: ConnHandle,
        handle: CharacteristicHandle,
        data: &[u8],
    ) -> Result<(), BleError>;
}

/// A [`Radio`] call in transit to the task that owns the stack.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioRequest {
    StartScan(ScanParams),
    StopScan,
    Connect(PeerAddress),
    CancelConnect,
    Disconnect(ConnHandle, DisconnectReason),
    Discover(ConnHandle, u16),
    Subscribe(ConnHandle, CharacteristicHandle),
    Write(ConnHandle, CharacteristicHandle, Vec<u8, GATT_WRITE_MAX>),
}

impl RadioRequest {
    /// Whether this request takes the radio out of an ongoing scan.
    ///
    /// Everything else either needs a link or cancels a connect attempt,
    /// and arrives during a scan only when it is stale.
    pub fn ends_scan(&self) -> bool {
        matches!(
            self,
            RadioRequest::StartScan(_) | RadioRequest::StopScan | RadioRequest::Connect(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: ConnHandle = ConnHandle(0);
    const SINK: CharacteristicHandle = CharacteristicHandle {
        value: 0x0013,
        cccd: None,
    };

    #[test]
    fn scan_ends_only_for_scan_and_connect_requests() {
        let peer = PeerAddress {
            kind: AddressKind::RandomStatic,
            bytes: [1, 2, 3, 4, 5, 6],
        };
        let params = ScanParams {
            interval_ms: 500,
            window_ms: 400,
        };
        assert!(RadioRequest::StartScan(params).ends_scan());
        assert!(RadioRequest::StopScan.ends_scan());
        assert!(RadioRequest::Connect(peer).ends_scan());
    }

    #[test]
    fn stale_link_requests_do_not_end_a_scan() {
        // A retarget racing a connect leaves a disconnect for a link that
        // is already gone; the scan that replaced it must keep running.
        let stale = [
            RadioRequest::CancelConnect,
            RadioRequest::Disconnect(CONN, DisconnectReason::RemoteUserTerminated),
            RadioRequest::Discover(CONN, 0x0001),
            RadioRequest::Subscribe(CONN, SINK),
            RadioRequest::Write(CONN, SINK, Vec::from_slice(&[1, 0, 2, 0]).unwrap()),
        ];
        for request in stale {
            assert!(!request.ends_scan(), "{:?}", request);
        }
    }

    #[test]
    fn hci_reasons_are_mapped() {
        assert_eq!(
            DisconnectReason::from_hci(0x13),
            DisconnectReason::RemoteUserTerminated
        );
        assert_eq!(
            DisconnectReason::from_hci(0x16),
            DisconnectReason::LocalHostTerminated
        );
        assert_eq!(DisconnectReason::from_hci(0x3E), DisconnectReason::Other(0x3E));
    }
}
