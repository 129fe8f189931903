//! Target device identity.
//!
//! A micro:bit advertises as `BBC micro:bit <suffix>`; the 5-character
//! suffix is what the gateway uses to pick one peripheral out of many.

use core::fmt;

use crate::config::DEVICE_ID_LEN;

/// Exactly five printable ASCII characters.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DeviceId([u8; DEVICE_ID_LEN]);

impl DeviceId {
    /// Validate a candidate suffix. Rejects wrong lengths and anything
    /// outside the ASCII graphic range.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != DEVICE_ID_LEN || !bytes.iter().all(u8::is_ascii_graphic) {
            return None;
        }
        let mut id = [0u8; DEVICE_ID_LEN];
        id.copy_from_slice(bytes);
        Some(Self(id))
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::from_bytes(s.as_bytes())
    }

    /// Case-sensitive byte comparison.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.0[..] == *bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII.
        core::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({:?})", self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

/// Holder of the active target, absent until first adopted or set.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity {
    current: Option<DeviceId>,
}

impl Identity {
    pub const fn new() -> Self {
        Self { current: None }
    }

    pub fn get(&self) -> Option<DeviceId> {
        self.current
    }

    pub fn is_set(&self) -> bool {
        self.current.is_some()
    }

    /// Replace the active identifier. Returns `true` if it changed.
    pub fn set(&mut self, id: DeviceId) -> bool {
        if self.current == Some(id) {
            return false;
        }
        self.current = Some(id);
        true
    }

    /// Take `id` only when nothing is set yet (first seen wins).
    pub fn adopt(&mut self, id: DeviceId) -> bool {
        if self.current.is_some() {
            return false;
        }
        self.current = Some(id);
        true
    }

    /// `true` when an identifier is set and equals `candidate` byte for byte.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        self.current.is_some_and(|id| id.matches(candidate))
    }
}
