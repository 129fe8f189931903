//! USB CDC-ACM console.
//!
//! Initialises the Embassy USB stack on the nRF52840 hardware USB
//! peripheral and exposes one serial port for the gateway protocol.

use crate::{EventSender, OutboxReceiver};
use defmt::{debug, info, warn};
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver;
use embassy_nrf::{self, bind_interrupts, peripherals};
use embassy_usb::class::cdc_acm::{self, CdcAcmClass, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Config, UsbDevice};
use heapless::{Deque, String, Vec};
use mbgate::config::{self, CONSOLE_CHUNK_MAX, LINE_TERMINATOR, OUTBOX_DEPTH, OUT_LINE_MAX};
use mbgate::gateway::GatewayEvent;
use mbgate::line::HostLink;
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    USBD => embassy_nrf::usb::InterruptHandler<peripherals::USBD>;
    CLOCK_POWER => embassy_nrf::usb::vbus_detect::InterruptHandler;
});

pub type UsbDriver = Driver<'static, peripherals::USBD, HardwareVbusDetect>;

/// Full-speed bulk packet size.
const MAX_PACKET_SIZE: u16 = 64;

/// One outbound line plus its terminator.
const FRAME_MAX: usize = OUT_LINE_MAX + LINE_TERMINATOR.len();

static CDC_STATE: StaticCell<State> = StaticCell::new();
static USB_CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_MSOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_CTRL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// Build result containing the USB device runner and the two halves of
/// the serial port.
pub struct UsbConsole {
    pub device: UsbDevice<'static, UsbDriver>,
    pub tx: cdc_acm::Sender<'static, UsbDriver>,
    pub rx: cdc_acm::Receiver<'static, UsbDriver>,
}

/// Initialise the USB stack and create the CDC-ACM console.
///
/// Must be called exactly once.  All static buffers are consumed here.
pub fn init(usbd: peripherals::USBD) -> UsbConsole {
    let driver = Driver::new(usbd, Irqs, HardwareVbusDetect::new(Irqs));

    let mut usb_config = Config::new(config::USB_VID, config::USB_PID);
    usb_config.manufacturer = Some(config::USB_MANUFACTURER);
    usb_config.product = Some(config::USB_PRODUCT);
    usb_config.serial_number = Some(config::USB_SERIAL_NUMBER);
    usb_config.max_power = 100; // mA
    usb_config.max_packet_size_0 = 64;

    // CDC-ACM uses two interfaces; announce them with an IAD.
    usb_config.device_class = 0xEF;
    usb_config.device_sub_class = 0x02;
    usb_config.device_protocol = 0x01;
    usb_config.composite_with_iads = true;

    let config_desc = USB_CONFIG_DESC.init([0u8; 256]);
    let bos_desc = USB_BOS_DESC.init([0u8; 256]);
    let msos_desc = USB_MSOS_DESC.init([0u8; 256]);
    let ctrl_buf = USB_CTRL_BUF.init([0u8; 64]);

    let mut builder = Builder::new(
        driver,
        usb_config,
        config_desc,
        bos_desc,
        msos_desc,
        ctrl_buf,
    );

    let state = CDC_STATE.init(State::new());
    let class = CdcAcmClass::new(&mut builder, state, MAX_PACKET_SIZE);
    let (tx, rx) = class.split();

    let device = builder.build();

    info!("USB CDC-ACM console initialised");

    UsbConsole { device, tx, rx }
}

/// Run the USB device stack - must be spawned as a dedicated Embassy task.
pub async fn run_usb_device(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    info!("USB device task started");
    device.run().await
}

/// Forward every received packet to the gateway as a console chunk.
pub async fn reader_task(mut rx: cdc_acm::Receiver<'static, UsbDriver>, events: EventSender) -> ! {
    let mut buf = [0u8; CONSOLE_CHUNK_MAX];

    loop {
        rx.wait_connection().await;
        info!("console attached");

        loop {
            match rx.read_packet(&mut buf).await {
                Ok(n) => {
                    if let Ok(chunk) = Vec::from_slice(&buf[..n]) {
                        events.send(GatewayEvent::Console(chunk)).await;
                    }
                }
                Err(EndpointError::BufferOverflow) => warn!("console packet too large"),
                Err(EndpointError::Disabled) => break,
            }
        }

        info!("console detached");
    }
}

/// Write outbound lines to the host as they are flushed by the gateway.
pub async fn writer_task(mut tx: cdc_acm::Sender<'static, UsbDriver>, outbox: OutboxReceiver) -> ! {
    info!("console writer started - waiting for lines");

    loop {
        let line = outbox.receive().await;
        if write_line(&mut tx, &line).await.is_err() {
            debug!("console not attached - dropping line");
        }
    }
}

async fn write_line(
    tx: &mut cdc_acm::Sender<'static, UsbDriver>,
    line: &str,
) -> Result<(), EndpointError> {
    let mut frame: Vec<u8, FRAME_MAX> = Vec::new();
    // Lines are built in a String<OUT_LINE_MAX>, so both always fit.
    let _ = frame.extend_from_slice(line.as_bytes());
    let _ = frame.extend_from_slice(LINE_TERMINATOR);

    let packet_size = usize::from(tx.max_packet_size());
    for packet in frame.chunks(packet_size) {
        tx.write_packet(packet).await?;
    }
    // A full last packet needs a zero-length packet to end the transfer.
    if frame.len() % packet_size == 0 {
        tx.write_packet(&[]).await?;
    }
    Ok(())
}

/// `HostLink` that buffers lines until the gateway task flushes them.
pub struct QueuedHost {
    lines: Deque<String<OUT_LINE_MAX>, OUTBOX_DEPTH>,
}

impl QueuedHost {
    pub const fn new() -> Self {
        Self {
            lines: Deque::new(),
        }
    }

    pub fn pop(&mut self) -> Option<String<OUT_LINE_MAX>> {
        self.lines.pop_front()
    }
}

impl HostLink for QueuedHost {
    fn write_line(&mut self, line: &str) {
        let mut owned = String::new();
        if owned.push_str(line).is_err() {
            warn!("console line too long - dropping");
            return;
        }
        if self.lines.push_back(owned).is_err() {
            warn!("console outbox full - dropping line");
        }
    }
}
