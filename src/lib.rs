//! Host-testable core of mbgate.
//!
//! Everything that does not touch the radio, USB or GPIO lives here: the
//! console command protocol, the event record codec, advertisement
//! filtering and the connection state machine. The embedded binary
//! (`main.rs`, `#![no_std]` + `#![no_main]`) plugs the SoftDevice, the
//! USB console and the status panel into these seams.
//!
//! Usage: `cargo test --lib` for unit tests, `cargo test` for everything.

#![cfg_attr(not(test), no_std)]

// Must come first: the logging macros are textually scoped.
mod fmt;

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod flow;
pub mod gateway;
pub mod identity;
pub mod line;

// ═══════════════════════════════════════════════════════════════════════════
// BLE Module Re-exports
// ═══════════════════════════════════════════════════════════════════════════

#[path = "ble/adv_filter.rs"]
mod ble_adv_filter_impl;
#[path = "ble/link.rs"]
mod ble_link_impl;

pub mod ble {
    pub mod adv_filter {
        pub use crate::ble_adv_filter_impl::*;
    }
    pub mod link {
        pub use crate::ble_link_impl::*;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Status Indicator
// ═══════════════════════════════════════════════════════════════════════════

pub mod ui {
    /// Coarse gateway status shown to the user.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Status {
        /// No target yet; waiting for the host or the override button.
        AwaitingTarget,
        Scanning,
        /// Linked, looking for the event characteristics.
        Discovering,
        Connected,
    }

    impl Status {
        /// Single glyph for small displays.
        pub fn code(self) -> char {
            match self {
                Status::AwaitingTarget => '?',
                Status::Scanning => 'S',
                Status::Discovering => 'D',
                Status::Connected => 'C',
            }
        }

        pub fn label(self) -> &'static str {
            match self {
                Status::AwaitingTarget => "Waiting",
                Status::Scanning => "Scanning",
                Status::Discovering => "Discovering",
                Status::Connected => "Connected",
            }
        }
    }

    /// Something that can show the current [`Status`].
    pub trait Indicator {
        fn show(&mut self, status: Status);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::ble::adv_filter::*;
    use super::identity::DeviceId;
    use super::ui::Status;

    /// Flags element followed by a Complete Local Name element.
    fn adv_with_name(name: &[u8]) -> std::vec::Vec<u8> {
        let mut data = vec![0x02, 0x01, 0x06];
        data.push(name.len() as u8 + 1);
        data.push(AD_TYPE_COMPLETE_LOCAL_NAME);
        data.extend_from_slice(name);
        data
    }

    // ════════════════════════════════════════════════════════════════════════
    // Advertisement Parsing Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn finds_complete_local_name() {
        let data = adv_with_name(b"BBC micro:bit [zivog]");
        assert_eq!(complete_local_name(&data), Some(&b"BBC micro:bit [zivog]"[..]));
    }

    #[test]
    fn shortened_name_is_not_used() {
        // len=5, type=0x08 (Shortened Local Name)
        let data = [0x05, 0x08, b'B', b'B', b'C', b' '];
        assert_eq!(complete_local_name(&data), None);
    }

    #[test]
    fn empty_advertisement_has_no_name() {
        assert_eq!(complete_local_name(&[]), None);
    }

    #[test]
    fn malformed_ad_length_zero() {
        let data = [0x00, 0x09, b'x'];
        assert_eq!(complete_local_name(&data), None);
    }

    #[test]
    fn ad_element_overrunning_buffer_is_ignored() {
        // Claims 10 bytes but only 3 follow.
        let data = [0x0A, 0x09, b'B', b'B'];
        assert_eq!(complete_local_name(&data), None);
    }

    #[test]
    fn suffix_follows_product_prefix() {
        assert_eq!(device_suffix(b"BBC micro:bit zivog"), Some(&b"zivog"[..]));
        // Only the first five bytes after the prefix count.
        assert_eq!(device_suffix(b"BBC micro:bit [zivog]"), Some(&b"[zivo"[..]));
        assert_eq!(device_suffix(b"BBC micro:bit zi"), None);
        assert_eq!(device_suffix(b"BBC microbit zivog"), None);
        assert_eq!(device_suffix(b"Keyboard"), None);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Filter Verdict Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn matching_target_connects() {
        let data = adv_with_name(b"BBC micro:bit zivog");
        let target = DeviceId::parse("zivog");
        assert_eq!(evaluate(&data, target), Verdict::Connect);
    }

    #[test]
    fn other_microbit_is_ignored() {
        let data = adv_with_name(b"BBC micro:bit gavit");
        let target = DeviceId::parse("zivog");
        assert_eq!(evaluate(&data, target), Verdict::Ignore);
    }

    #[test]
    fn first_microbit_is_adopted_without_target() {
        let data = adv_with_name(b"BBC micro:bit gavit");
        let expected = DeviceId::parse("gavit").unwrap();
        assert_eq!(evaluate(&data, None), Verdict::Adopt(expected));
    }

    #[test]
    fn unrelated_device_is_ignored_without_target() {
        let data = adv_with_name(b"Surface Keyboard");
        assert_eq!(evaluate(&data, None), Verdict::Ignore);
    }

    #[test]
    fn unprintable_suffix_is_not_adopted() {
        let data = adv_with_name(b"BBC micro:bit ab de");
        assert_eq!(evaluate(&data, None), Verdict::Ignore);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Status Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn status_codes_are_distinct() {
        let codes = [
            Status::AwaitingTarget.code(),
            Status::Scanning.code(),
            Status::Discovering.code(),
            Status::Connected.code(),
        ];
        assert_eq!(codes, ['?', 'S', 'D', 'C']);
    }
}
