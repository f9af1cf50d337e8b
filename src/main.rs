#[cfg(target_os = "espidf")]
use std::{thread, time::Duration};

#[cfg(target_os = "espidf")]
use anyhow::Context;

#[cfg(target_os = "espidf")]
use nowplaying::{
    clock::MonotonicClock,
    config::DeviceConfig,
    device::{Capabilities, Device},
    esp::{EpaperPanel, EspBatteryAdc, EspBroker, EspRadio},
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::{delay::Delay, peripherals::Peripherals};

// https://docs.esp-rs.org/esp-idf-svc/esp_idf_svc/
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    match start() {
        Ok(mut device) => device.run(),
        Err(e) => {
            // nothing to retry without working hardware, stay up so the log stays readable
            log::error!("Startup failed: {:?}", e);
            loop {
                thread::sleep(Duration::from_secs(60));
            }
        }
    }
}

#[cfg(target_os = "espidf")]
fn start() -> anyhow::Result<
    Device<EspRadio, EspBroker, EpaperPanel, EspBatteryAdc, MonotonicClock, Delay>,
> {
    let config = DeviceConfig::from_build_config().context("invalid cfg.toml")?;
    let pins = config.board.pins();
    log::info!("Board {} with pins {:?}", config.board, pins);

    let peripherals = Peripherals::take().context("Could not take peripherals")?;

    let panel =
        EpaperPanel::new(peripherals.spi2, pins, config.rotation).context("e-paper panel")?;
    let layout = panel.layout();

    let hw = Capabilities {
        radio: EspRadio::new(peripherals.modem).context("Wi-Fi driver")?,
        broker: EspBroker::new(),
        panel,
        battery_adc: EspBatteryAdc::new(pins.battery_adc_channel).context("battery ADC")?,
    };

    Ok(Device::new(
        config,
        hw,
        MonotonicClock::new(),
        Delay::default(),
        layout,
    ))
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("nowplaying-epaper is firmware, build it for an ESP-IDF target")
}
