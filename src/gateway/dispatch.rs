//! Inbound console commands.

use crate::ble::link::Radio;
use crate::command::Command;
use crate::error::CommandError;
use crate::event::Event;
use crate::identity::DeviceId;
use crate::line::HostLink;
use crate::ui::Indicator;

use super::{ConnectionState, Gateway};

impl<R: Radio, H: HostLink, I: Indicator> Gateway<R, H, I> {
    /// Frame console bytes into lines and run every completed line.
    pub fn handle_console(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if let Some(line) = self.framer.push(byte) {
                self.handle_line(&line);
            }
        }
    }

    /// Interpret one complete line. Unrecognised lines are dropped silently;
    /// recognised but invalid ones get a diagnostic.
    pub fn handle_line(&mut self, line: &[u8]) {
        let Ok(line) = core::str::from_utf8(line) else {
            debug!("dropping non-UTF-8 console line");
            return;
        };
        match Command::parse(line).and_then(|cmd| self.apply(cmd)) {
            Ok(()) | Err(CommandError::Shape) => {}
            Err(err) => {
                debug!("command rejected: {}", err);
                self.diagnostic(format_args!("ignored: {}", err));
            }
        }
    }

    fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::SetIdentity(id) => {
                self.set_identity(id);
                Ok(())
            }
            Command::SendEvent { device, event } => self.send_event(device, event),
        }
    }

    fn set_identity(&mut self, id: DeviceId) {
        let changed = self.identity.set(id);
        if changed {
            info!("target set to {}", id);
            self.diagnostic(format_args!("Set device to '{}'", id));
        }

        match self.state {
            ConnectionState::Idle => self.start_scan_cycle(),
            ConnectionState::Connecting if changed => {
                if let Err(err) = self.radio.cancel_connect() {
                    warn!("cancel connect failed: {}", err);
                }
                self.start_scan_cycle();
            }
            ConnectionState::Discovering | ConnectionState::Ready if changed => {
                if let Some(conn) = self.conn {
                    self.drop_link(conn);
                }
            }
            // Scanning picks the new target up from the next advertisement.
            _ => {}
        }
    }

    fn send_event(&mut self, device: DeviceId, event: Event) -> Result<(), CommandError> {
        if !self.identity.matches(device.as_bytes()) {
            return Err(CommandError::Addressing);
        }
        let linked = matches!(
            self.state,
            ConnectionState::Discovering | ConnectionState::Ready
        );
        let (true, Some(conn), Some(sink)) = (linked, self.conn, self.sink) else {
            return Err(CommandError::NotConnected);
        };

        if let Err(err) = self.radio.write(conn, sink, &event.to_bytes()) {
            warn!("event write failed: {}", err);
            self.diagnostic(format_args!("ERROR: Write request returned: {}", err));
        }
        Ok(())
    }
}
