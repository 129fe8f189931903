//! mbgate firmware - micro:bit event service ↔ USB serial console.
//!
//! Task layout:
//!
//! ```text
//!   radio_task ─────────► REPORTS ──┐       ┌──► REQUESTS ──► radio_task
//!   radio_task (drops) ──┐          ├──► gateway_task
//!   console_rx ──────────┼► EVENTS ─┘       └──► OUTBOX ───► console_tx
//!   override ────────────┘
//! ```
//!
//! `gateway_task` is the only place the gateway state lives. After every
//! event it flushes the radio requests and console lines the event
//! produced, then waits for the next one. Link outcomes travel on REPORTS,
//! which the gateway keeps draining even while it waits for room on
//! REQUESTS; advertisements and notifications share EVENTS and are
//! dropped when it is full.

#![no_std]
#![no_main]

mod ble;
mod ui;
mod usb;

use core::mem;

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{AnyPin, Pin};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_usb::class::cdc_acm;
use embassy_usb::UsbDevice;
use heapless::{Deque, String};
use mbgate::ble::link::{RadioRequest, StackEvent};
use mbgate::config::{
    EVENT_QUEUE_DEPTH, OUTBOX_DEPTH, OUT_LINE_MAX, REPORT_QUEUE_DEPTH, REQUEST_QUEUE_DEPTH,
};
use mbgate::flow;
use mbgate::gateway::{Gateway, GatewayEvent};
use nrf_softdevice::{raw, Softdevice};
use {defmt_rtt as _, panic_probe as _};

use crate::ble::QueuedRadio;
use crate::ui::StatusPanel;
use crate::usb::console::{QueuedHost, UsbDriver};

bind_interrupts!(struct TwimIrqs {
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

pub type EventSender = Sender<'static, CriticalSectionRawMutex, GatewayEvent, EVENT_QUEUE_DEPTH>;
pub type RequestReceiver =
    Receiver<'static, CriticalSectionRawMutex, RadioRequest, REQUEST_QUEUE_DEPTH>;
pub type ReportSender = Sender<'static, CriticalSectionRawMutex, StackEvent, REPORT_QUEUE_DEPTH>;
pub type OutboxReceiver =
    Receiver<'static, CriticalSectionRawMutex, String<OUT_LINE_MAX>, OUTBOX_DEPTH>;

type Panel = StatusPanel<Twim<'static, peripherals::TWISPI0>>;
type AppGateway = Gateway<QueuedRadio, QueuedHost, Panel>;
type Backlog = Deque<StackEvent, REPORT_QUEUE_DEPTH>;

/// Console, button and droppable radio traffic for the gateway.
static EVENTS: Channel<CriticalSectionRawMutex, GatewayEvent, EVENT_QUEUE_DEPTH> = Channel::new();
/// Radio driver → gateway: outcomes that must not be dropped.
static REPORTS: Channel<CriticalSectionRawMutex, StackEvent, REPORT_QUEUE_DEPTH> =
    Channel::new();
/// Gateway → radio driver.
static REQUESTS: Channel<CriticalSectionRawMutex, RadioRequest, REQUEST_QUEUE_DEPTH> =
    Channel::new();
/// Gateway → console writer.
static OUTBOX: Channel<CriticalSectionRawMutex, String<OUT_LINE_MAX>, OUTBOX_DEPTH> =
    Channel::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn radio_task(sd: &'static Softdevice) -> ! {
    ble::driver::run(sd, REQUESTS.receiver(), REPORTS.sender(), EVENTS.sender()).await
}

#[embassy_executor::task]
async fn usb_task(device: UsbDevice<'static, UsbDriver>) -> ! {
    usb::console::run_usb_device(device).await
}

#[embassy_executor::task]
async fn console_rx_task(rx: cdc_acm::Receiver<'static, UsbDriver>) -> ! {
    usb::console::reader_task(rx, EVENTS.sender()).await
}

#[embassy_executor::task]
async fn console_tx_task(tx: cdc_acm::Sender<'static, UsbDriver>) -> ! {
    usb::console::writer_task(tx, OUTBOX.receiver()).await
}

#[embassy_executor::task]
async fn override_task(pin: AnyPin) -> ! {
    ui::buttons::override_task(pin, EVENTS.sender()).await
}

#[embassy_executor::task]
async fn gateway_task(panel: Panel) -> ! {
    let mut gateway: AppGateway = Gateway::new(QueuedRadio::new(), QueuedHost::new(), panel);
    let mut backlog = Backlog::new();
    gateway.start();

    loop {
        flush(&mut gateway, &mut backlog).await;
        let event = match backlog.pop_front() {
            Some(report) => GatewayEvent::Stack(report),
            None => match select(REPORTS.receive(), EVENTS.receive()).await {
                Either::First(report) => GatewayEvent::Stack(report),
                Either::Second(event) => event,
            },
        };
        gateway.handle(event);
    }
}

/// Hand queued effects to their consumers. Awaiting here throttles the
/// gateway to the speed of the radio driver and the console; driver
/// reports that arrive meanwhile go to `backlog`.
async fn flush(gateway: &mut AppGateway, backlog: &mut Backlog) {
    while let Some(request) = gateway.radio_mut().pop() {
        flow::send_draining(REQUESTS.sender(), request, REPORTS.receiver(), backlog).await;
    }
    while let Some(line) = gateway.host_mut().pop() {
        OUTBOX.send(line).await;
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: b"mbgate" as *const u8 as _,
            current_len: 6,
            max_len: 6,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("mbgate starting");

    // Priorities 0, 1 and 4 belong to the SoftDevice.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::USBD.set_priority(Priority::P2);
    interrupt::CLOCK_POWER.set_priority(Priority::P2);
    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0.set_priority(Priority::P2);

    let sd: &'static Softdevice = Softdevice::enable(&softdevice_config());
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let console = usb::console::init(p.USBD);
    unwrap!(spawner.spawn(usb_task(console.device)));
    unwrap!(spawner.spawn(console_rx_task(console.rx)));
    unwrap!(spawner.spawn(console_tx_task(console.tx)));

    let mut twim_config = twim::Config::default();
    twim_config.frequency = twim::Frequency::K400;
    let i2c = Twim::new(p.TWISPI0, TwimIrqs, p.P0_26, p.P0_27, twim_config);
    let panel = StatusPanel::new(i2c);

    unwrap!(spawner.spawn(override_task(p.P0_11.degrade())));
    unwrap!(spawner.spawn(radio_task(sd)));
    unwrap!(spawner.spawn(gateway_task(panel)));
}
