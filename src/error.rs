//! Error types shared by the gateway core and the target adapters.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use core::fmt;

/// Failures reported across the radio seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// GAP / GATT raw error code from the SoftDevice.
    Raw(u32),
    /// Scan was cancelled or could not start.
    ScanFailed,
    /// Connection attempt failed.
    ConnectFailed,
    /// GATT discovery failed.
    DiscoveryFailed,
    /// CCCD write enabling notifications failed.
    NotifyFailed,
    /// Characteristic write failed.
    WriteFailed,
    /// The request queue towards the radio is full.
    Busy,
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BleError::Raw(code) => write!(f, "raw error {}", code),
            BleError::ScanFailed => f.write_str("scan failed"),
            BleError::ConnectFailed => f.write_str("connect failed"),
            BleError::DiscoveryFailed => f.write_str("discovery failed"),
            BleError::NotifyFailed => f.write_str("notification request failed"),
            BleError::WriteFailed => f.write_str("write request failed"),
            BleError::Busy => f.write_str("radio busy"),
        }
    }
}

/// Why an inbound console command was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Not a recognised command shape (wrong code or topic).
    Shape,
    /// A field has the wrong length, or a required field is missing.
    Length,
    /// The device field does not address the active target.
    Addressing,
    /// Event data does not start with a number where one is required.
    Number,
    /// Type or reason outside `1..=0xFFFF`.
    Range,
    /// Characters left over after the two numbers.
    TrailingInput,
    /// The event sink characteristic is not available.
    NotConnected,
}

impl CommandError {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandError::Shape => "unrecognised command",
            CommandError::Length => "bad field length",
            CommandError::Addressing => "not addressed to the active device",
            CommandError::Number => "bad number",
            CommandError::Range => "value out of range",
            CommandError::TrailingInput => "trailing input",
            CommandError::NotConnected => "event sink not connected",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
