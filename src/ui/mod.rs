//! User interface subsystem - OLED status panel + override button.
//!
//! ## Components
//!
//! - **Display**: SSD1306 128×64 OLED via I²C, showing the gateway status
//!   code (`?`, `S`, `D`, `C`) and its label
//! - **Button**: one tactile switch with debouncing; in the waiting state
//!   it makes the gateway adopt the first micro:bit it sees

pub mod buttons;
pub mod display;

use display::Display;
use mbgate::ui::{Indicator, Status};

/// `Indicator` backed by the OLED.
pub struct StatusPanel<I2C> {
    display: Display<I2C>,
}

impl<I2C> StatusPanel<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    pub fn new(i2c: I2C) -> Self {
        Self {
            display: display::init(i2c),
        }
    }
}

impl<I2C> Indicator for StatusPanel<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    fn show(&mut self, status: Status) {
        defmt::info!("status: {}", status);
        display::draw_status(&mut self.display, status);
    }
}
