//! ESP-IDF implementations of the hardware capabilities

pub mod adc;
pub mod epaper;
pub mod mqtt;
pub mod wifi;

pub use adc::EspBatteryAdc;
pub use epaper::EpaperPanel;
pub use mqtt::EspBroker;
pub use wifi::EspRadio;
