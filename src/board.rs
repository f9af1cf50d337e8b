//! Pin definitions for the supported boards
//!
//! The e-paper panel is wired to a different set of GPIOs on every board, and
//! the battery divider lands on a different ADC channel. The board is picked
//! at build time and resolved once at startup into a [`PinMap`].

use std::fmt;
use std::str::FromStr;

use crate::battery::BatteryConfig;
use crate::config::ConfigError;

/// Boards the firmware has pin tables for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardVariant {
    /// ESP32-S3 DevKit with the panel on the right-hand header
    Esp32S3DevKit,
    /// Classic ESP32 DevKitC, VSPI wiring
    Esp32DevKitC,
    /// Wemos/Lolin D32, has the on-board LiPo charger and divider on GPIO35
    LolinD32,
}

/// GPIO assignment for the e-paper panel and battery sense line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    /// Busy status pin (High when display is busy)
    pub busy: u8,
    /// Reset pin for display
    pub rst: u8,
    /// Data/Command control pin (High for data, Low for command)
    pub dc: u8,
    /// Chip Select pin for SPI display
    pub cs: u8,
    /// SPI Clock pin
    pub sck: u8,
    /// SPI Master Out Slave In
    pub mosi: u8,
    /// ADC1 channel the battery divider is connected to
    pub battery_adc_channel: u8,
}

impl BoardVariant {
    pub fn pins(self) -> PinMap {
        match self {
            BoardVariant::Esp32S3DevKit => PinMap {
                busy: 48,
                rst: 47,
                dc: 46,
                cs: 45,
                sck: 12,
                mosi: 11,
                // GPIO9
                battery_adc_channel: 8,
            },
            BoardVariant::Esp32DevKitC => PinMap {
                busy: 4,
                rst: 16,
                dc: 17,
                cs: 5,
                sck: 18,
                mosi: 23,
                // GPIO34
                battery_adc_channel: 6,
            },
            BoardVariant::LolinD32 => PinMap {
                busy: 4,
                rst: 16,
                dc: 17,
                cs: 5,
                sck: 18,
                mosi: 23,
                // GPIO35
                battery_adc_channel: 7,
            },
        }
    }

    /// Battery divider and ADC scaling for this board
    pub fn battery(self) -> BatteryConfig {
        match self {
            // 100k/100k divider on all three, 12-bit oneshot reads
            BoardVariant::Esp32S3DevKit | BoardVariant::Esp32DevKitC | BoardVariant::LolinD32 => {
                BatteryConfig {
                    reference_volts: 3.3,
                    divider_ratio: 2.0,
                    // reads low at full charge with 11 dB attenuation
                    calibration: 1.1,
                    full_scale: 4096,
                    samples: 4,
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BoardVariant::Esp32S3DevKit => "s3",
            BoardVariant::Esp32DevKitC => "devkitc",
            BoardVariant::LolinD32 => "d32",
        }
    }
}

impl FromStr for BoardVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(BoardVariant::Esp32S3DevKit),
            "devkitc" => Ok(BoardVariant::Esp32DevKitC),
            "d32" => Ok(BoardVariant::LolinD32),
            _ => Err(ConfigError::UnknownBoard(s.to_string())),
        }
    }
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
