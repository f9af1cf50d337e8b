use std::net::Ipv4Addr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::{EspNvsPartition, NvsDefault};
use esp_idf_svc::wifi::{BlockingWifi, EspWifi, WifiDeviceId};
use log::{info, warn};

use crate::config::{WifiAuth, WifiNetwork};
use crate::wifi::Radio;

const ASSOCIATION_POLL: Duration = Duration::from_millis(100);

/// Station-mode radio on top of the ESP-IDF Wi-Fi driver
pub struct EspRadio {
    wifi: Box<BlockingWifi<EspWifi<'static>>>,
    scanned: bool,
}

impl EspRadio {
    pub fn new(modem: Modem) -> Result<Self> {
        let sys_loop = EspSystemEventLoop::take()?;
        let nvs = EspNvsPartition::<NvsDefault>::take()?;

        let wifi = Box::new(BlockingWifi::wrap(
            EspWifi::new(modem, sys_loop.clone(), Some(nvs))?,
            sys_loop,
        )?);

        Ok(Self {
            wifi,
            scanned: false,
        })
    }

    fn ensure_started(&mut self) -> Result<()> {
        if !self.wifi.is_started()? {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
            self.wifi.start()?;
        }
        Ok(())
    }

    /// One scan per boot, only to tell "wrong password" from "AP not in range"
    fn log_visibility(&mut self, ssid: &str) {
        if self.scanned {
            return;
        }
        self.scanned = true;

        match self.wifi.scan() {
            Ok(aps) => {
                info!("Found {} available networks", aps.len());
                if !aps.iter().any(|ap| ap.ssid.as_str() == ssid) {
                    warn!("{} is not among the visible networks", ssid);
                }
            }
            Err(e) => warn!("Wi-Fi scan failed: {}", e),
        }
    }
}

impl Radio for EspRadio {
    type Error = anyhow::Error;

    fn connect_to_network(&mut self, network: &WifiNetwork, timeout: Duration) -> Result<()> {
        self.ensure_started()?;
        self.log_visibility(&network.ssid);

        let auth_method = match network.auth {
            WifiAuth::Open => AuthMethod::None,
            WifiAuth::Wpa2Personal => AuthMethod::WPA2Personal,
        };
        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: network
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("SSID does not fit the driver buffer"))?,
            password: network
                .password
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("password does not fit the driver buffer"))?,
            auth_method,
            ..Default::default()
        });

        if self.wifi.is_connected()? {
            self.wifi.disconnect()?;
        }
        self.wifi.set_configuration(&wifi_config)?;

        // non-blocking connect so the attempt honours our own timeout
        self.wifi.wifi_mut().connect()?;
        let deadline = Instant::now() + timeout;
        while !self.wifi.is_connected()? {
            if Instant::now() >= deadline {
                if let Err(e) = self.wifi.disconnect() {
                    warn!("Wi-Fi disconnect after timeout failed: {}", e);
                }
                bail!("not associated after {:?}", timeout);
            }
            thread::sleep(ASSOCIATION_POLL);
        }
        Ok(())
    }

    fn assigned_address(&mut self) -> Result<Ipv4Addr> {
        let ip_info = self.wifi.wifi().sta_netif().get_ip_info()?;
        if ip_info.ip.is_unspecified() {
            bail!("DHCP lease pending");
        }
        Ok(ip_info.ip)
    }

    fn is_associated(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn mac_address(&mut self) -> Result<[u8; 6]> {
        Ok(self.wifi.wifi().get_mac(WifiDeviceId::Sta)?)
    }
}
