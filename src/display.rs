//! E-paper frame sequencing
//!
//! The panel controller needs its command phases in a fixed order with
//! minimum settle times in between:
//!
//! 1. full clear of the panel and of the in-memory frame
//! 1. wait [`CLEAR_SETTLE_MS`], commands issued earlier are dropped by the controller
//! 1. draw artist, title and battery footer into the frame
//! 1. wait [`COMMIT_SETTLE_MS`] before the refresh command
//! 1. commit the frame, which starts the panel's own multi-second full refresh
//!
//! The delays are hardware floors, do not shorten them.

use embedded_graphics::prelude::Point;
use embedded_hal::delay::DelayNs;
use thiserror::Error;

use crate::battery::BatteryReading;
use crate::config::ConfigError;
use crate::layout::{layout, LayoutConfig};
use crate::payload::TrackMetadata;

/// Minimum wait after a full clear before the controller takes new commands
pub const CLEAR_SETTLE_MS: u32 = 3000;

/// Minimum wait between the last buffer write and the refresh command
pub const COMMIT_SETTLE_MS: u32 = 1500;

/// Clockwise rotation of the frame relative to the panel's native
/// landscape orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u16) -> Result<Self, ConfigError> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(ConfigError::Rotation(other)),
        }
    }

    /// Drawable width and height of a `width` x `height` panel
    pub fn oriented(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Rotation::Deg0 | Rotation::Deg180 => (width, height),
            Rotation::Deg90 | Rotation::Deg270 => (height, width),
        }
    }
}

/// Drawing surface backed by an e-paper panel and its frame buffer.
///
/// Coordinates passed to [`draw_text`](Panel::draw_text) are in the rotated
/// frame, the implementation owns the rotation.
pub trait Panel {
    type Error: core::fmt::Debug;

    /// Blank the physical panel
    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Blank the in-memory frame
    fn clear_buffer(&mut self) -> Result<(), Self::Error>;

    /// Draw one line of text with its baseline at `baseline`
    fn draw_text(&mut self, text: &str, baseline: Point) -> Result<(), Self::Error>;

    /// Push the frame to the panel and refresh
    fn commit(&mut self) -> Result<(), Self::Error>;
}

/// Which step of the update cycle failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStep {
    Clear,
    ClearBuffer,
    Draw,
    Commit,
}

#[derive(Debug, Error)]
#[error("display {step:?} failed: {detail}")]
pub struct RenderError {
    pub step: RenderStep,
    pub detail: String,
}

impl RenderError {
    fn new<E: core::fmt::Debug>(step: RenderStep, err: E) -> Self {
        RenderError {
            step,
            detail: format!("{:?}", err),
        }
    }
}

/// Runs the clear/settle/draw/settle/commit cycle on a panel
pub struct DisplaySequencer<P, D> {
    panel: P,
    delay: D,
    layout: LayoutConfig,
}

impl<P, D> DisplaySequencer<P, D>
where
    P: Panel,
    D: DelayNs,
{
    pub fn new(panel: P, delay: D, layout: LayoutConfig) -> Self {
        Self {
            panel,
            delay,
            layout,
        }
    }

    /// Replace the frame with `track` and the battery footer
    pub fn render_track(
        &mut self,
        track: &TrackMetadata,
        battery: &BatteryReading,
    ) -> Result<(), RenderError> {
        log::info!("Rendering {:?} - {:?}", track.artist, track.title);
        self.begin_frame()?;

        // stray whitespace from the publisher would only shift or split lines
        let artist = layout(
            track.artist.trim(),
            &self.layout,
            Point::new(self.layout.left_margin, self.layout.first_baseline),
        );
        let title = layout(
            track.title.trim(),
            &self.layout,
            Point::new(
                self.layout.left_margin,
                artist.last_baseline() + self.layout.field_gap,
            ),
        );

        for segment in artist.segments().chain(title.segments()) {
            self.panel
                .draw_text(&segment.text, segment.position)
                .map_err(|e| RenderError::new(RenderStep::Draw, e))?;
        }

        let footer = battery.to_string();
        log::info!("{}", footer);
        self.panel
            .draw_text(
                &footer,
                Point::new(self.layout.left_margin, self.layout.footer_baseline),
            )
            .map_err(|e| RenderError::new(RenderStep::Draw, e))?;

        self.finish_frame()
    }

    /// Show a single status line, used before any track has arrived
    pub fn show_status(&mut self, text: &str) -> Result<(), RenderError> {
        log::info!("Status: {}", text);
        self.begin_frame()?;
        self.panel
            .draw_text(
                text,
                Point::new(self.layout.left_margin, self.layout.first_baseline),
            )
            .map_err(|e| RenderError::new(RenderStep::Draw, e))?;
        self.finish_frame()
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.panel
            .clear()
            .map_err(|e| RenderError::new(RenderStep::Clear, e))?;
        self.panel
            .clear_buffer()
            .map_err(|e| RenderError::new(RenderStep::ClearBuffer, e))?;
        self.delay.delay_ms(CLEAR_SETTLE_MS);
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), RenderError> {
        self.delay.delay_ms(COMMIT_SETTLE_MS);
        self.panel
            .commit()
            .map_err(|e| RenderError::new(RenderStep::Commit, e))
    }
}
