use esp_idf_svc::sys::{
    adc_atten_t_ADC_ATTEN_DB_12, adc_bitwidth_t_ADC_BITWIDTH_12, adc_channel_t,
    adc_oneshot_chan_cfg_t, adc_oneshot_config_channel, adc_oneshot_del_unit,
    adc_oneshot_new_unit, adc_oneshot_read, adc_oneshot_unit_handle_t,
    adc_oneshot_unit_init_cfg_t, adc_unit_t_ADC_UNIT_1, esp, EspError,
};

use crate::battery::BatteryAdc;

/// Oneshot reads of one ADC1 channel.
///
/// The channel number comes from the board pin table at runtime, which the
/// typed channel drivers in esp-idf-hal cannot express, so this talks to the
/// oneshot driver directly.
pub struct EspBatteryAdc {
    unit: adc_oneshot_unit_handle_t,
    channel: adc_channel_t,
}

impl EspBatteryAdc {
    pub fn new(channel: u8) -> Result<Self, EspError> {
        let channel = adc_channel_t::from(channel);
        let unit_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ..Default::default()
        };
        // 0-3.1 V input range, the divider keeps a full cell below that
        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };

        let mut unit: adc_oneshot_unit_handle_t = core::ptr::null_mut();
        unsafe {
            esp!(adc_oneshot_new_unit(&unit_cfg, &mut unit))?;
            if let Err(e) = esp!(adc_oneshot_config_channel(unit, channel, &chan_cfg)) {
                adc_oneshot_del_unit(unit);
                return Err(e);
            }
        }

        log::info!("Battery sense on ADC1 channel {}", channel);
        Ok(Self { unit, channel })
    }
}

impl BatteryAdc for EspBatteryAdc {
    type Error = EspError;

    fn read_raw(&mut self) -> Result<u16, EspError> {
        let mut raw: i32 = 0;
        unsafe {
            esp!(adc_oneshot_read(self.unit, self.channel, &mut raw))?;
        }
        Ok(raw.clamp(0, i32::from(u16::MAX)) as u16)
    }
}

impl Drop for EspBatteryAdc {
    fn drop(&mut self) {
        unsafe {
            adc_oneshot_del_unit(self.unit);
        }
    }
}
