//! GPIO button input with async debouncing.
//!
//! One physical button (active-low with internal pull-up):
//!   - A - while the gateway waits for a target, accept the first
//!     micro:bit seen
//!
//! The task waits for a GPIO edge, debounces it, and sends
//! `GatewayEvent::Override` to the gateway channel.

use crate::EventSender;
use defmt::info;
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_time::{Duration, Timer};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;
use mbgate::config::BUTTON_DEBOUNCE_MS;
use mbgate::gateway::GatewayEvent;

/// Run the override button loop.
pub async fn override_task(pin: AnyPin, events: EventSender) -> ! {
    let mut btn = Input::new(pin, Pull::Up);

    loop {
        wait_for_press(&mut btn).await;
        info!("Button: override");
        events.send(GatewayEvent::Override).await;
        wait_for_release(&mut btn).await;
    }
}

/// Wait for a falling edge that is still low after the debounce time.
async fn wait_for_press<P>(pin: &mut P)
where
    P: Wait + InputPin,
{
    loop {
        let _ = pin.wait_for_falling_edge().await;
        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
        if pin.is_low().unwrap_or(false) {
            return;
        }
    }
}

/// Wait for release to avoid repeat triggers.
async fn wait_for_release<P>(pin: &mut P)
where
    P: Wait + InputPin,
{
    let _ = pin.wait_for_high().await;
    Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
}
