//! Now-playing e-paper display
//!
//! Joins a Wi-Fi network, subscribes to an MQTT topic carrying the current
//! track as JSON and redraws a Waveshare e-paper panel for every update. The
//! platform independent logic lives here behind small capability traits, the
//! ESP-IDF implementations of those traits live in [`esp`].

pub mod battery;
pub mod board;
pub mod clock;
pub mod config;
pub mod device;
pub mod display;
pub mod inbox;
pub mod layout;
pub mod payload;
pub mod session;
pub mod state;
pub mod wifi;

#[cfg(target_os = "espidf")]
pub mod esp;

#[cfg(test)]
mod testing;
