//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Central** role on
//! behalf of the gateway core:
//!
//! 1. **Queued radio** - implements the core's `Radio` trait by queueing
//!    `RadioRequest`s; the gateway task forwards them to the driver.
//! 2. **Driver** - one task that owns the SoftDevice central API: scanning,
//!    connecting, event-service discovery, CCCD and value writes. Outcomes
//!    go back to the gateway as `StackEvent`s.
//!
//! Communication with other tasks is done via Embassy channels defined
//! in the crate root.

pub mod driver;

use heapless::{Deque, Vec};
use mbgate::ble::link::{
    CharacteristicHandle, ConnHandle, DisconnectReason, PeerAddress, Radio, RadioRequest,
    ScanParams,
};
use mbgate::config::REQUEST_QUEUE_DEPTH;
use mbgate::error::BleError;

/// `Radio` that only records what the gateway asked for.
///
/// Requests are drained after every dispatched event, so the queue only
/// has to hold what a single event can produce.
pub struct QueuedRadio {
    queue: Deque<RadioRequest, REQUEST_QUEUE_DEPTH>,
}

impl QueuedRadio {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    pub fn pop(&mut self) -> Option<RadioRequest> {
        self.queue.pop_front()
    }

    fn enqueue(&mut self, request: RadioRequest) -> Result<(), BleError> {
        self.queue.push_back(request).map_err(|_| BleError::Busy)
    }
}

impl Radio for QueuedRadio {
    fn start_scan(&mut self, params: ScanParams) -> Result<(), BleError> {
        self.enqueue(RadioRequest::StartScan(params))
    }

    fn stop_scan(&mut self) -> Result<(), BleError> {
        self.enqueue(RadioRequest::StopScan)
    }

    fn connect(&mut self, peer: PeerAddress) -> Result<(), BleError> {
        self.enqueue(RadioRequest::Connect(peer))
    }

    fn cancel_connect(&mut self) -> Result<(), BleError> {
        self.enqueue(RadioRequest::CancelConnect)
    }

    fn disconnect(&mut self, conn: ConnHandle, reason: DisconnectReason) -> Result<(), BleError> {
        self.enqueue(RadioRequest::Disconnect(conn, reason))
    }

    fn discover(&mut self, conn: ConnHandle, service_uuid16: u16) -> Result<(), BleError> {
        self.enqueue(RadioRequest::Discover(conn, service_uuid16))
    }

    fn subscribe(
        &mut self,
        conn: ConnHandle,
        handle: CharacteristicHandle,
    ) -> Result<(), BleError> {
        self.enqueue(RadioRequest::Subscribe(conn, handle))
    }

    fn write(
        &mut self,
        conn: ConnHandle,
        handle: CharacteristicHandle,
        data: &[u8],
    ) -> Result<(), BleError> {
        let data = Vec::from_slice(data).map_err(|_| BleError::WriteFailed)?;
        self.enqueue(RadioRequest::Write(conn, handle, data))
    }
}
