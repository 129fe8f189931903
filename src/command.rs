//! Host console command protocol.
//!
//! Inbound lines have the shape `<code> <device> <topic> <data>`:
//!
//! ```text
//! I ABCDE mb\setname zivog      retarget the gateway
//! I ABCDE mb\evtsvc 0x1234:7    send an event to the connected device
//! ```
//!
//! [`CommandFrame`] only splits a line into fields. [`Command::from_frame`]
//! checks the field shapes and decodes the data. Checks that depend on
//! gateway state (addressing, link availability) are left to the dispatcher.

use crate::config::{DEVICE_ID_LEN, INBOUND_CODE, TOPIC_EVENT, TOPIC_SET_NAME};
use crate::error::CommandError;
use crate::event::Event;
use crate::identity::DeviceId;

/// Maximum number of fields in a frame; the last one takes the rest of the line.
pub const MAX_FIELDS: usize = 4;

const CODE: usize = 0;
const DEVICE: usize = 1;
const TOPIC: usize = 2;
const DATA: usize = 3;

/// A line split into up to four space-separated fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    fields: [Option<&'a str>; MAX_FIELDS],
}

impl<'a> CommandFrame<'a> {
    /// Split `line` on spaces. Runs of spaces count as one boundary and
    /// everything after the third boundary is kept verbatim as the data field.
    pub fn parse(line: &'a str) -> Self {
        let mut fields = [None; MAX_FIELDS];
        if line.is_empty() {
            return Self { fields };
        }

        let mut rest = line;
        for (i, slot) in fields.iter_mut().enumerate() {
            if i == MAX_FIELDS - 1 {
                *slot = Some(rest);
                break;
            }
            match rest.split_once(' ') {
                Some((field, tail)) => {
                    *slot = Some(field);
                    rest = tail.trim_start_matches(' ');
                    if rest.is_empty() {
                        break;
                    }
                }
                None => {
                    *slot = Some(rest);
                    break;
                }
            }
        }
        Self { fields }
    }

    pub fn code(&self) -> Option<&'a str> {
        self.fields[CODE]
    }

    pub fn device(&self) -> Option<&'a str> {
        self.fields[DEVICE]
    }

    pub fn topic(&self) -> Option<&'a str> {
        self.fields[TOPIC]
    }

    pub fn data(&self) -> Option<&'a str> {
        self.fields[DATA]
    }

    pub fn len(&self) -> usize {
        self.fields.iter().filter(|f| f.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A validated inbound command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replace the active target identifier.
    SetIdentity(DeviceId),
    /// Write `event` to the device named by `device`.
    SendEvent { device: DeviceId, event: Event },
}

impl Command {
    /// Validate a frame against the two known command shapes.
    ///
    /// Field lengths are exact: a topic one character short is not a
    /// shorter spelling, it is not a command.
    pub fn from_frame(frame: &CommandFrame<'_>) -> Result<Self, CommandError> {
        if frame.code() != Some(INBOUND_CODE) {
            return Err(CommandError::Shape);
        }
        match frame.topic() {
            Some(TOPIC_SET_NAME) => Self::set_identity(frame),
            Some(TOPIC_EVENT) => Self::send_event(frame),
            _ => Err(CommandError::Shape),
        }
    }

    pub fn parse(line: &str) -> Result<Self, CommandError> {
        Self::from_frame(&CommandFrame::parse(line))
    }

    fn set_identity(frame: &CommandFrame<'_>) -> Result<Self, CommandError> {
        let device = frame
            .device()
            .filter(|d| d.len() == DEVICE_ID_LEN)
            .ok_or(CommandError::Length)?;
        // `I <device> mb\setname <new>` carries the new id in the data field;
        // the short form `I <new> mb\setname` uses the device field.
        let new_id = frame.data().unwrap_or(device);
        DeviceId::parse(new_id)
            .map(Command::SetIdentity)
            .ok_or(CommandError::Length)
    }

    fn send_event(frame: &CommandFrame<'_>) -> Result<Self, CommandError> {
        let device = frame
            .device()
            .and_then(DeviceId::parse)
            .ok_or(CommandError::Length)?;
        let data = frame
            .data()
            .filter(|d| !d.is_empty())
            .ok_or(CommandError::Length)?;
        let event = parse_event_data(data)?;
        Ok(Command::SendEvent { device, event })
    }
}

/// Decode `<type>:<reason>` where each number is decimal or `0x` hex.
///
/// Colons are treated as spaces, leading whitespace before each number is
/// skipped, and the whole input must be consumed.
pub fn parse_event_data(data: &str) -> Result<Event, CommandError> {
    let mut cursor = Cursor::new(data.as_bytes());
    let event_type = cursor.number()?;
    let reason = cursor.number()?;
    if !cursor.at_end() {
        return Err(CommandError::TrailingInput);
    }

    let event_type = u16::try_from(event_type).map_err(|_| CommandError::Range)?;
    let reason = u16::try_from(reason).map_err(|_| CommandError::Range)?;
    Event::new(event_type, reason).ok_or(CommandError::Range)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(b) if b == b':' || b.is_ascii_whitespace() || b == 0x0B)
        {
            self.pos += 1;
        }
    }

    /// Parse one unsigned literal. Saturates instead of wrapping so that
    /// oversized input is still reported as out of range.
    fn number(&mut self) -> Result<u32, CommandError> {
        self.skip_separators();

        let hex_prefix = matches!(self.peek(), Some(b'0'))
            && matches!(self.bytes.get(self.pos + 1), Some(b'x' | b'X'))
            && self.bytes.get(self.pos + 2).is_some_and(u8::is_ascii_hexdigit);
        let radix = if hex_prefix {
            self.pos += 2;
            16
        } else {
            10
        };

        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(digit) = self.peek().and_then(|b| (b as char).to_digit(radix)) {
            value = value.saturating_mul(radix).saturating_add(digit);
            self.pos += 1;
        }

        if self.pos == start {
            return Err(CommandError::Number);
        }
        Ok(value)
    }
}
