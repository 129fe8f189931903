//! Event record codec.
//!
//! On the radio an event is a fixed 4-byte record: `type` followed by
//! `reason`, both little-endian `u16`. On the console it is written as
//! `0x<type>:0x<reason>` with four lowercase hex digits each.

use core::fmt;

/// Size of one event record on the wire.
pub const EVENT_RECORD_SIZE: usize = 4;

/// A `{type, reason}` pair from the micro:bit event bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    pub event_type: u16,
    pub reason: u16,
}

impl Event {
    /// Build an event for sending. Zero is not a valid type or reason.
    pub fn new(event_type: u16, reason: u16) -> Option<Self> {
        if event_type == 0 || reason == 0 {
            return None;
        }
        Some(Self { event_type, reason })
    }

    /// Decode the first record of `data`. Extra bytes are ignored.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < EVENT_RECORD_SIZE {
            return None;
        }
        Some(Self {
            event_type: u16::from_le_bytes([data[0], data[1]]),
            reason: u16::from_le_bytes([data[2], data[3]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; EVENT_RECORD_SIZE] {
        let t = self.event_type.to_le_bytes();
        let r = self.reason.to_le_bytes();
        [t[0], t[1], r[0], r[1]]
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}:0x{:04x}", self.event_type, self.reason)
    }
}

/// Iterate over the complete records of a notification payload.
///
/// A trailing partial record is dropped.
pub fn records(payload: &[u8]) -> impl Iterator<Item = Event> + '_ {
    payload
        .chunks_exact(EVENT_RECORD_SIZE)
        .filter_map(Event::from_bytes)
}
