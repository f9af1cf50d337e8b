use anyhow::Result;
use embedded_graphics::mono_font::{iso_8859_15::FONT_10X20, MonoTextStyle};
use embedded_graphics::prelude::*;
use embedded_graphics::text::Text;
use epd_waveshare::epd4in2::{Display4in2, Epd4in2, HEIGHT, WIDTH};
use epd_waveshare::prelude::{Color, DisplayRotation, WaveshareDisplay};
use esp_idf_svc::hal::delay::Delay;
use esp_idf_svc::hal::gpio::{AnyIOPin, Input, Output, PinDriver};
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::spi::{self, SpiDeviceDriver, SpiDriver, SPI2};

use crate::board::PinMap;
use crate::display::{Panel, Rotation};
use crate::layout::LayoutConfig;

type EpdSpi = SpiDeviceDriver<'static, SpiDriver<'static>>;
type InPin = PinDriver<'static, AnyIOPin, Input>;
type OutPin = PinDriver<'static, AnyIOPin, Output>;

// https://docs.rs/embedded-graphics/0.8.1/embedded_graphics/mono_font/index.html#modules
const CHAR_ADVANCE: u32 = 10;
const LINE_HEIGHT: u32 = 20;

/// Waveshare 4.2" black/white panel with its frame buffer
pub struct EpaperPanel {
    spi: EpdSpi,
    epd: Epd4in2<EpdSpi, InPin, OutPin, OutPin, Delay>,
    frame: Box<Display4in2>,
    delay: Delay,
    rotation: Rotation,
}

impl EpaperPanel {
    /// Bring up SPI and the panel controller on the board's pins
    pub fn new(spi2: SPI2, pins: PinMap, rotation: Rotation) -> Result<Self> {
        // SAFETY: every GPIO comes from the board table, used once, and none of
        // them is handed out through `Peripherals` elsewhere.
        let (sck, mosi, cs, busy, dc, rst) = unsafe {
            (
                AnyIOPin::new(i32::from(pins.sck)),
                AnyIOPin::new(i32::from(pins.mosi)),
                AnyIOPin::new(i32::from(pins.cs)),
                AnyIOPin::new(i32::from(pins.busy)),
                AnyIOPin::new(i32::from(pins.dc)),
                AnyIOPin::new(i32::from(pins.rst)),
            )
        };

        log::info!("Configuring SPI for the e-paper panel");
        let mut spi = spi::SpiDeviceDriver::new_single(
            spi2,
            sck,
            mosi,
            Option::<AnyIOPin>::None, // panel is write-only
            Some(cs),
            &spi::SpiDriverConfig::new(),
            &spi::SpiConfig::new().baudrate(4.MHz().into()),
        )?;

        let mut delay = Delay::default();
        let epd = Epd4in2::new(
            &mut spi,
            PinDriver::input(busy)?,
            PinDriver::output(dc)?,
            PinDriver::output(rst)?,
            &mut delay,
            None,
        )
        .map_err(|e| anyhow::anyhow!("e-paper init failed: {:?}", e))?;
        log::info!("E-paper panel initialised ({}x{}, {:?})", WIDTH, HEIGHT, rotation);

        let mut frame: Box<Display4in2> = Box::default();
        frame.set_rotation(match rotation {
            Rotation::Deg0 => DisplayRotation::Rotate0,
            Rotation::Deg90 => DisplayRotation::Rotate90,
            Rotation::Deg180 => DisplayRotation::Rotate180,
            Rotation::Deg270 => DisplayRotation::Rotate270,
        });

        Ok(Self {
            spi,
            epd,
            frame,
            delay,
            rotation,
        })
    }

    /// Text geometry for this panel, font and rotation
    pub fn layout(&self) -> LayoutConfig {
        let (width, height) = self.rotation.oriented(WIDTH, HEIGHT);
        LayoutConfig::for_panel(width, height, CHAR_ADVANCE, LINE_HEIGHT)
    }
}

impl Panel for EpaperPanel {
    type Error = <EpdSpi as embedded_hal::spi::ErrorType>::Error;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.epd.clear_frame(&mut self.spi, &mut self.delay)?;
        self.epd.display_frame(&mut self.spi, &mut self.delay)
    }

    fn clear_buffer(&mut self) -> Result<(), Self::Error> {
        // drawing into RAM cannot fail
        self.frame.clear(Color::White).map_err(|e| match e {})
    }

    fn draw_text(&mut self, text: &str, baseline: Point) -> Result<(), Self::Error> {
        let style = MonoTextStyle::new(&FONT_10X20, Color::Black);
        Text::new(text, baseline, style)
            .draw(&mut *self.frame)
            .map(|_| ())
            .map_err(|e| match e {})
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.epd
            .update_and_display_frame(&mut self.spi, self.frame.buffer(), &mut self.delay)
    }
}
