//! Peripheral notifications to the host console.

use core::fmt::Write;

use heapless::String;

use crate::ble::link::{ConnHandle, Radio};
use crate::config::{OUT_LINE_MAX, PUBLISH_CODE, TOPIC_EVENT};
use crate::event;
use crate::ui::Indicator;

use crate::line::HostLink;

use super::{ConnectionState, Gateway};

impl<R: Radio, H: HostLink, I: Indicator> Gateway<R, H, I> {
    /// Publish every complete event record of a source notification as one
    /// `P` line. Notifications outside Ready, or on other handles or links,
    /// are ignored.
    pub(super) fn relay(&mut self, conn: ConnHandle, value_handle: u16, data: &[u8]) {
        if self.state != ConnectionState::Ready || self.conn != Some(conn) {
            return;
        }
        if self.source.map(|source| source.value) != Some(value_handle) {
            debug!("notification on handle {} ignored", value_handle);
            return;
        }
        let Some(id) = self.identity.get() else {
            return;
        };

        for record in event::records(data) {
            let mut line: String<OUT_LINE_MAX> = String::new();
            let _ = write!(line, "{} {} {} {}", PUBLISH_CODE, id, TOPIC_EVENT, record);
            self.host.write_line(&line);
        }
    }
}
