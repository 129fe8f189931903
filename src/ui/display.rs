//! SSD1306 OLED display wrapper.

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Text;
use mbgate::ui::Status;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

/// Type alias for the concrete display driver.
///
/// Generic over the I²C implementation so callers pass in their HAL's
/// I²C peripheral.
pub type Display<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// Initialise the SSD1306 display and clear the screen.
pub fn init<I2C>(i2c: I2C) -> Display<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    let _ = display.init();
    display.clear_buffer();
    let _ = display.flush();
    display
}

fn text_style(font: &'static MonoFont<'static>) -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(font)
        .text_color(BinaryColor::On)
        .build()
}

/// Render the status screen: product line, large status code, label.
pub fn draw_status<I2C>(display: &mut Display<I2C>, status: Status)
where
    I2C: embedded_hal::i2c::I2c,
{
    display.clear_buffer();

    let _ = Text::new("mbgate", Point::new(0, 10), text_style(&FONT_6X10)).draw(display);

    let mut code = [0u8; 4];
    let code = status.code().encode_utf8(&mut code);
    let _ = Text::new(code, Point::new(0, 38), text_style(&FONT_10X20)).draw(display);
    let _ = Text::new(status.label(), Point::new(20, 34), text_style(&FONT_6X10)).draw(display);

    if status == Status::AwaitingTarget {
        let _ = Text::new("A: first micro:bit", Point::new(0, 58), text_style(&FONT_6X10)).draw(display);
    }

    let _ = display.flush();
}
