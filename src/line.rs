//! Console line framing, and the host side of the console.

use heapless::Vec;

use crate::config::LINE_MAX;

pub type Line = Vec<u8, LINE_MAX>;

/// Host side of the console channel.
pub trait HostLink {
    /// Write one line. The transport appends the terminator.
    fn write_line(&mut self, line: &str);
}

/// Accumulates console bytes into lines.
///
/// A line ends at `\n` (a preceding `\r` is dropped) or when `LINE_MAX`
/// bytes have been collected without a terminator.
#[derive(Default)]
pub struct LineFramer {
    buf: Line,
}

impl LineFramer {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one byte; returns the completed line, if this byte finished one.
    pub fn push(&mut self, byte: u8) -> Option<Line> {
        if byte == b'\n' {
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
            return Some(core::mem::take(&mut self.buf));
        }

        // Capacity is LINE_MAX and the buffer is flushed when full, so this
        // push always has room.
        let _ = self.buf.push(byte);
        if self.buf.is_full() {
            return Some(core::mem::take(&mut self.buf));
        }
        None
    }

    /// Bytes buffered towards the next line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
