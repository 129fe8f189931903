//! Integration tests for the mbgate gateway: whole sessions driven through
//! the public API with recording test doubles.

use mbgate::ble::link::{
    AddressKind, CharacteristicHandle, ConnHandle, DisconnectReason, PeerAddress, Radio, Role,
    ScanParams, StackEvent,
};
use mbgate::config::{EVENT_SINK_UUID16, EVENT_SOURCE_UUID16, LINE_MAX};
use mbgate::error::BleError;
use mbgate::gateway::{ConnectionState, Gateway, GatewayEvent};
use mbgate::identity::DeviceId;
use mbgate::line::HostLink;
use mbgate::ui::{Indicator, Status};

#[derive(Default)]
struct RecordingRadio {
    connects: Vec<PeerAddress>,
    disconnects: Vec<ConnHandle>,
    writes: Vec<Vec<u8>>,
    scans: usize,
}

impl Radio for RecordingRadio {
    fn start_scan(&mut self, _params: ScanParams) -> Result<(), BleError> {
        self.scans += 1;
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), BleError> {
        Ok(())
    }

    fn connect(&mut self, peer: PeerAddress) -> Result<(), BleError> {
        self.connects.push(peer);
        Ok(())
    }

    fn cancel_connect(&mut self) -> Result<(), BleError> {
        Ok(())
    }

    fn disconnect(&mut self, conn: ConnHandle, _reason: DisconnectReason) -> Result<(), BleError> {
        self.disconnects.push(conn);
        Ok(())
    }

    fn discover(&mut self, _conn: ConnHandle, _service_uuid16: u16) -> Result<(), BleError> {
        Ok(())
    }

    fn subscribe(
        &mut self,
        _conn: ConnHandle,
        _handle: CharacteristicHandle,
    ) -> Result<(), BleError> {
        Ok(())
    }

    fn write(
        &mut self,
        _conn: ConnHandle,
        _handle: CharacteristicHandle,
        data: &[u8],
    ) -> Result<(), BleError> {
        self.writes.push(data.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct Console {
    lines: Vec<String>,
}

impl HostLink for Console {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }
}

impl Console {
    fn published(&self) -> Vec<&str> {
        self.lines
            .iter()
            .map(String::as_str)
            .filter(|l| l.starts_with("P "))
            .collect()
    }
}

#[derive(Default)]
struct Leds {
    last: Option<Status>,
}

impl Indicator for Leds {
    fn show(&mut self, status: Status) {
        self.last = Some(status);
    }
}

type Session = Gateway<RecordingRadio, Console, Leds>;

const SOURCE: CharacteristicHandle = CharacteristicHandle {
    value: 0x0021,
    cccd: Some(0x0022),
};
const SINK: CharacteristicHandle = CharacteristicHandle {
    value: 0x0024,
    cccd: None,
};

fn session() -> Session {
    let mut gw = Gateway::new(RecordingRadio::default(), Console::default(), Leds::default());
    gw.start();
    gw
}

fn peer(last: u8) -> PeerAddress {
    PeerAddress {
        kind: AddressKind::Public,
        bytes: [1, 2, 3, 4, 5, last],
    }
}

fn type_line(gw: &mut Session, line: &str) {
    let mut bytes = line.as_bytes().to_vec();
    bytes.push(b'\n');
    for chunk in bytes.chunks(16) {
        gw.handle(GatewayEvent::Console(heapless::Vec::from_slice(chunk).unwrap()));
    }
}

fn advertise(gw: &mut Session, from: PeerAddress, name: &str) {
    let mut data = heapless::Vec::new();
    data.push(name.len() as u8 + 1).unwrap();
    data.push(0x09).unwrap();
    data.extend_from_slice(name.as_bytes()).unwrap();
    gw.handle(GatewayEvent::Stack(StackEvent::Advertisement { peer: from, data }));
}

fn stack(gw: &mut Session, event: StackEvent) {
    gw.handle(GatewayEvent::Stack(event));
}

/// Connect and discover on `conn`, reporting the given characteristics.
fn link_up(gw: &mut Session, conn: ConnHandle, found: &[(u16, CharacteristicHandle)]) {
    stack(
        gw,
        StackEvent::Connected {
            conn,
            role: Role::Central,
        },
    );
    for &(uuid16, handle) in found {
        stack(
            gw,
            StackEvent::CharacteristicDiscovered {
                conn,
                uuid16,
                handle,
            },
        );
    }
    stack(gw, StackEvent::DiscoveryComplete { conn });
}

fn notify(gw: &mut Session, conn: ConnHandle, payload: &[u8]) {
    stack(
        gw,
        StackEvent::Notification {
            conn,
            handle: SOURCE.value,
            data: heapless::Vec::from_slice(payload).unwrap(),
        },
    );
}

const BOTH: [(u16, CharacteristicHandle); 2] =
    [(EVENT_SOURCE_UUID16, SOURCE), (EVENT_SINK_UUID16, SINK)];

#[test]
fn first_seen_suffix_is_adopted_once() {
    let mut gw = session();
    gw.handle(GatewayEvent::Override);

    advertise(&mut gw, peer(1), "BBC micro:bit tupog");
    advertise(&mut gw, peer(2), "BBC micro:bit zivog");

    assert_eq!(gw.identity(), DeviceId::parse("tupog"));
    assert_eq!(gw.radio().connects, vec![peer(1)]);
}

#[test]
fn only_exact_suffix_is_connected() {
    let mut gw = session();
    type_line(&mut gw, "I tupog mb\\setname");

    advertise(&mut gw, peer(1), "BBC micro:bit tupoG");
    advertise(&mut gw, peer(2), "BBC micro:bit tupo");
    advertise(&mut gw, peer(3), "BBC micro:bit  tupog");
    assert!(gw.radio().connects.is_empty());

    advertise(&mut gw, peer(4), "BBC micro:bit tupog");
    assert_eq!(gw.radio().connects, vec![peer(4)]);
}

#[test]
fn full_session_relays_events_both_ways() {
    let mut gw = session();
    type_line(&mut gw, "I tupog mb\\setname");
    advertise(&mut gw, peer(1), "BBC micro:bit tupog");
    link_up(&mut gw, ConnHandle(0), &BOTH);
    assert_eq!(gw.state(), ConnectionState::Ready);
    assert_eq!(gw.indicator().last, Some(Status::Connected));

    notify(&mut gw, ConnHandle(0), &[0x9A, 0x04, 0x01, 0x00]);
    assert_eq!(gw.host().published(), vec!["P tupog mb\\evtsvc 0x049a:0x0001"]);

    type_line(&mut gw, "I tupog mb\\evtsvc 0xFFFF:0xFFFF");
    type_line(&mut gw, "I tupog mb\\evtsvc 1178 : 3");
    assert_eq!(
        gw.radio().writes,
        vec![vec![0xFF, 0xFF, 0xFF, 0xFF], vec![0x9A, 0x04, 0x03, 0x00]]
    );
}

#[test]
fn every_event_value_relays_verbatim() {
    let mut gw = session();
    type_line(&mut gw, "I tupog mb\\setname");
    advertise(&mut gw, peer(1), "BBC micro:bit tupog");
    link_up(&mut gw, ConnHandle(0), &BOTH);

    for (event_type, reason) in [(1u16, 1u16), (0x00FF, 0x0100), (0xFFFF, 0xFFFF), (9, 0xABCD)] {
        let mut payload = event_type.to_le_bytes().to_vec();
        payload.extend_from_slice(&reason.to_le_bytes());
        notify(&mut gw, ConnHandle(0), &payload);
        let expected = format!("P tupog mb\\evtsvc 0x{:04x}:0x{:04x}", event_type, reason);
        assert_eq!(gw.host().published().last().copied(), Some(expected.as_str()));
    }
}

#[test]
fn partial_records_are_dropped() {
    let mut gw = session();
    type_line(&mut gw, "I tupog mb\\setname");
    advertise(&mut gw, peer(1), "BBC micro:bit tupog");
    link_up(&mut gw, ConnHandle(0), &BOTH);

    for k in 0..3usize {
        for r in 1..4usize {
            let before = gw.host().published().len();
            notify(&mut gw, ConnHandle(0), &vec![0x11; 4 * k + r]);
            assert_eq!(gw.host().published().len() - before, k);
        }
    }
}

#[test]
fn incomplete_service_is_torn_down() {
    let mut gw = session();
    type_line(&mut gw, "I tupog mb\\setname");
    advertise(&mut gw, peer(1), "BBC micro:bit tupog");
    link_up(&mut gw, ConnHandle(4), &[(EVENT_SINK_UUID16, SINK)]);

    assert_ne!(gw.state(), ConnectionState::Ready);
    assert_eq!(gw.radio().disconnects, vec![ConnHandle(4)]);

    stack(
        &mut gw,
        StackEvent::Disconnected {
            conn: ConnHandle(4),
            reason: DisconnectReason::LocalHostTerminated,
        },
    );
    assert_eq!(gw.state(), ConnectionState::Scanning);
}

#[test]
fn any_disconnect_from_ready_rescans() {
    for reason in [
        DisconnectReason::RemoteUserTerminated,
        DisconnectReason::ConnectionTimeout,
        DisconnectReason::from_hci(0x3E),
    ] {
        let mut gw = session();
        type_line(&mut gw, "I tupog mb\\setname");
        advertise(&mut gw, peer(1), "BBC micro:bit tupog");
        link_up(&mut gw, ConnHandle(0), &BOTH);
        let scans = gw.radio().scans;

        stack(
            &mut gw,
            StackEvent::Disconnected {
                conn: ConnHandle(0),
                reason,
            },
        );
        assert_eq!(gw.state(), ConnectionState::Scanning);
        assert!(!gw.source_found());
        assert!(!gw.sink_found());
        assert_eq!(gw.radio().scans, scans + 1);
        assert_eq!(gw.indicator().last, Some(Status::Scanning));
    }
}

#[test]
fn setname_field_lengths_are_strict() {
    let mut gw = session();
    type_line(&mut gw, "I ABCDE mb\\setnam X");
    assert_eq!(gw.identity(), None);
    assert_eq!(gw.state(), ConnectionState::Idle);

    type_line(&mut gw, "I ABCDE mb\\setname ABCDX");
    assert_eq!(gw.identity(), DeviceId::parse("ABCDX"));
    assert_eq!(gw.state(), ConnectionState::Scanning);

    let lines = gw.host().lines.len();
    type_line(&mut gw, "I ABCDE mb\\setname ABCDX");
    assert_eq!(gw.identity(), DeviceId::parse("ABCDX"));
    assert_eq!(gw.host().lines.len(), lines);
}

#[test]
fn send_event_numeric_boundaries() {
    let mut gw = session();
    type_line(&mut gw, "I tupog mb\\setname");
    advertise(&mut gw, peer(1), "BBC micro:bit tupog");
    link_up(&mut gw, ConnHandle(0), &BOTH);

    for rejected in ["0:1", "1:0", "1:2:3", "0x10000:1", "x:1", ""] {
        type_line(&mut gw, &format!("I tupog mb\\evtsvc {}", rejected));
    }
    assert!(gw.radio().writes.is_empty());
    assert!(gw.host().published().is_empty());

    type_line(&mut gw, "I tupog mb\\evtsvc 0xFFFF:0xFFFF");
    assert_eq!(gw.radio().writes.len(), 1);
}

#[test]
fn overlong_line_is_flushed_at_limit() {
    let mut gw = session();

    // A command padded with spaces to exactly LINE_MAX bytes, no newline.
    let mut line = String::from("I tupog mb\\setname");
    while line.len() < LINE_MAX {
        line.push(' ');
    }
    gw.handle(GatewayEvent::Console(
        heapless::Vec::from_slice(&line.as_bytes()[..64]).unwrap(),
    ));
    assert_eq!(gw.identity(), None);
    gw.handle(GatewayEvent::Console(
        heapless::Vec::from_slice(&line.as_bytes()[64..]).unwrap(),
    ));
    assert_eq!(gw.identity(), DeviceId::parse("tupog"));

    // The rest of the overlong run is a line of its own and not a command.
    let lines = gw.host().lines.len();
    type_line(&mut gw, "junk");
    assert_eq!(gw.host().lines.len(), lines);
}

#[test]
fn garbage_does_not_wedge_the_framer() {
    let mut gw = session();
    let garbage = "x".repeat(3 * LINE_MAX);
    type_line(&mut gw, &garbage);
    type_line(&mut gw, "I tupog mb\\setname\r");
    assert_eq!(gw.identity(), DeviceId::parse("tupog"));
}

#[test]
fn retarget_while_ready_moves_to_new_device() {
    let mut gw = session();
    type_line(&mut gw, "I tupog mb\\setname");
    advertise(&mut gw, peer(1), "BBC micro:bit tupog");
    link_up(&mut gw, ConnHandle(0), &BOTH);

    type_line(&mut gw, "I tupog mb\\setname zivog");
    assert_eq!(gw.radio().disconnects, vec![ConnHandle(0)]);
    stack(
        &mut gw,
        StackEvent::Disconnected {
            conn: ConnHandle(0),
            reason: DisconnectReason::LocalHostTerminated,
        },
    );

    advertise(&mut gw, peer(1), "BBC micro:bit tupog");
    advertise(&mut gw, peer(2), "BBC micro:bit zivog");
    assert_eq!(gw.radio().connects, vec![peer(1), peer(2)]);

    link_up(&mut gw, ConnHandle(1), &BOTH);
    notify(&mut gw, ConnHandle(1), &[2, 0, 3, 0]);
    assert_eq!(gw.host().published(), vec!["P zivog mb\\evtsvc 0x0002:0x0003"]);
}
