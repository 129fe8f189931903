//! Application-wide constants and compile-time configuration.
//!
//! All protocol literals, radio timing parameters, queue depths and pin
//! notes live here so they can be tuned in one place.

// Target peripheral

/// Complete Local Name prefix advertised by every micro:bit (14 bytes).
pub const PRODUCT_NAME_PREFIX: &[u8] = b"BBC micro:bit ";

/// Length of the device suffix that follows the name prefix.
pub const DEVICE_ID_LEN: usize = 5;

/// 16-bit aliases of the vendor-specific event service UUIDs.
///
/// The SoftDevice reports 128-bit vendor UUIDs by their bytes 12-13, so the
/// gateway matches discovered attributes on these values.
pub const EVENT_SERVICE_UUID16: u16 = 0x93AF;
/// Peripheral → central events (notify).
pub const EVENT_SOURCE_UUID16: u16 = 0x9775;
/// Central → peripheral events (write).
pub const EVENT_SINK_UUID16: u16 = 0x5404;

/// Event service UUID `E95D93AF-251D-470A-A062-FA1922DFA9A8`, little-endian.
pub const EVENT_SERVICE_UUID128: [u8; 16] = [
    0xA8, 0xA9, 0xDF, 0x22, 0x19, 0xFA, 0x62, 0xA0, 0x0A, 0x47, 0x1D, 0x25, 0xAF, 0x93, 0x5D, 0xE9,
];

// BLE

/// Scan interval (ms).
pub const SCAN_INTERVAL_MS: u16 = 500;

/// Scan window (ms).
pub const SCAN_WINDOW_MS: u16 = 400;

/// Legacy advertising / scan response payload limit.
pub const ADV_DATA_MAX: usize = 31;

/// Largest notification payload forwarded to the gateway.
/// Must cover the negotiated ATT MTU minus the 3-byte header.
pub const NOTIFICATION_MAX_LEN: usize = 64;

/// Largest value written to a peer characteristic (ATT MTU 23 minus header).
pub const GATT_WRITE_MAX: usize = 20;

/// BLE connection interval range (in 1.25 ms units).
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

// Console protocol

/// Longest inbound line; a longer run is flushed as a line of this length.
pub const LINE_MAX: usize = 99;

/// Capacity of one outbound console line (without terminator).
pub const OUT_LINE_MAX: usize = 80;

/// Appended to every outbound console line.
pub const LINE_TERMINATOR: &[u8] = b"\n";

/// Command code for host → gateway lines.
pub const INBOUND_CODE: &str = "I";

/// Command code for gateway → host event lines.
pub const PUBLISH_CODE: &str = "P";

/// Prefix of advisory diagnostic lines.
pub const DIAGNOSTIC_CODE: &str = "D";

/// Topic that carries events in both directions.
pub const TOPIC_EVENT: &str = "mb\\evtsvc";

/// Topic that retargets the gateway to another device.
pub const TOPIC_SET_NAME: &str = "mb\\setname";

// Queues

/// Depth of the inbound queue for console chunks, the override button,
/// advertisements and notifications.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Depth of the gateway → radio driver request queue.
pub const REQUEST_QUEUE_DEPTH: usize = 8;

/// Depth of the radio driver → gateway report queue, and of the backlog the
/// gateway fills from it while a request is waiting for room.
///
/// Must exceed the reports one request can produce: a discovery yields one
/// per characteristic plus its completion.
pub const REPORT_QUEUE_DEPTH: usize = 8;

/// Outbound console lines buffered between two flushes.
pub const OUTBOX_DEPTH: usize = 24;

/// Largest chunk of console bytes carried by one event (one USB FS packet).
pub const CONSOLE_CHUNK_MAX: usize = 64;

// USB

/// USB VID/PID - use the "pid.codes" open-source test VID.
/// Replace with your own allocated VID/PID for production.
pub const USB_VID: u16 = 0x1209;
pub const USB_PID: u16 = 0x0001;

/// USB device strings.
pub const USB_MANUFACTURER: &str = "mbgate";
pub const USB_PRODUCT: &str = "micro:bit BLE Event Gateway";
pub const USB_SERIAL_NUMBER: &str = "000001";

// GPIO pin assignments (nRF52840-DK defaults)
//
//   Button OVERRIDE → P0.11  (connect to the first micro:bit seen)
//   I²C SDA         → P0.26
//   I²C SCL         → P0.27

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;
