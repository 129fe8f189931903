//! USB Device subsystem - presents a CDC-ACM serial console to the host.
//!
//! The nRF52840's built-in USB 2.0 Full-Speed controller is driven by
//! `embassy-usb`. The console carries the gateway's line protocol in both
//! directions:
//!
//! - OUT endpoint: host commands, forwarded to the gateway as raw chunks
//! - IN endpoint:  `P` event lines and `D` diagnostics
//!
//! The gateway task queues outbound lines in a [`console::QueuedHost`] and
//! flushes them to the writer task through the outbox channel.

pub mod console;
