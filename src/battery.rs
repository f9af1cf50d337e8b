//! Battery voltage sampling for the diagnostic footer
//!
//! The value is advisory only. A bad conversion is logged and skipped, and
//! the next render takes a fresh reading anyway.

use std::fmt;

/// Source of raw ADC conversions on the battery sense line
pub trait BatteryAdc {
    type Error: fmt::Debug;

    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// Scaling from ADC code to battery voltage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryConfig {
    /// ADC reference voltage
    pub reference_volts: f32,
    /// Voltage divider between the cell and the ADC pin
    pub divider_ratio: f32,
    /// Empirical correction for the ADC front end
    pub calibration: f32,
    /// Code count of the converter (4096 for 12-bit)
    pub full_scale: u32,
    /// Conversions averaged per reading
    pub samples: u8,
}

/// One averaged battery reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryReading {
    pub raw: u16,
    pub volts: f32,
}

impl fmt::Display for BatteryReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VBat: {:.2} ({:x})", self.volts, self.raw)
    }
}

impl BatteryConfig {
    pub fn volts(&self, raw: u16) -> f32 {
        if self.full_scale == 0 {
            return 0.0;
        }
        f32::from(raw) * self.reference_volts * self.divider_ratio * self.calibration
            / self.full_scale as f32
    }
}

pub struct BatterySampler<A> {
    adc: A,
    config: BatteryConfig,
}

impl<A: BatteryAdc> BatterySampler<A> {
    pub fn new(adc: A, config: BatteryConfig) -> Self {
        Self { adc, config }
    }

    /// Average `config.samples` conversions into a reading
    pub fn sample(&mut self) -> BatteryReading {
        let mut sum: u32 = 0;
        let mut taken: u32 = 0;

        for _ in 0..self.config.samples.max(1) {
            match self.adc.read_raw() {
                Ok(raw) => {
                    sum += u32::from(raw);
                    taken += 1;
                }
                Err(e) => log::warn!("Battery ADC read failed: {:?}", e),
            }
        }

        if taken == 0 {
            log::warn!("No battery conversions succeeded, reporting 0 V");
            return BatteryReading { raw: 0, volts: 0.0 };
        }

        let raw = (sum / taken) as u16;
        BatteryReading {
            raw,
            volts: self.config.volts(raw),
        }
    }
}
