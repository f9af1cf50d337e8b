//! Wi-Fi bring-up
//!
//! Associates the radio with the configured access point and waits for a
//! DHCP lease. Association is retried forever with a fixed pause, there is no
//! other network to fall back to and nothing else to do while offline.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use thiserror::Error;

use crate::config::{RetryPolicy, WifiNetwork};

/// Station-mode Wi-Fi radio
pub trait Radio {
    type Error: fmt::Debug;

    /// Associate with `network`, giving up after `timeout`
    fn connect_to_network(
        &mut self,
        network: &WifiNetwork,
        timeout: Duration,
    ) -> Result<(), Self::Error>;

    /// Address handed out by DHCP, errors while the lease is pending
    fn assigned_address(&mut self) -> Result<Ipv4Addr, Self::Error>;

    fn is_associated(&mut self) -> bool;

    fn mac_address(&mut self) -> Result<[u8; 6], Self::Error>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BringUpError {
    #[error("association with {ssid:?} failed: {reason}")]
    RadioAssociationFailed { ssid: String, reason: String },
    #[error("no address assigned yet: {0}")]
    AddressAcquisitionFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unassociated,
    Associating,
    Associated(Ipv4Addr),
    Failed,
}

pub struct NetworkBringUp<R, D> {
    radio: R,
    delay: D,
    network: WifiNetwork,
    retry: RetryPolicy,
    state: LinkState,
    attempts: u32,
}

impl<R, D> NetworkBringUp<R, D>
where
    R: Radio,
    D: DelayNs,
{
    pub fn new(radio: R, delay: D, network: WifiNetwork, retry: RetryPolicy) -> Self {
        Self {
            radio,
            delay,
            network,
            retry,
            state: LinkState::Unassociated,
            attempts: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Association attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Single association attempt, then wait for an address.
    ///
    /// Returns as soon as association fails, the caller decides when to retry.
    /// Once associated, DHCP is polled until a lease arrives.
    pub fn attempt(&mut self) -> Result<Ipv4Addr, BringUpError> {
        self.attempts += 1;
        self.state = LinkState::Associating;
        log::info!(
            "Connecting to {} (attempt {})",
            self.network.ssid,
            self.attempts
        );

        if let Err(e) = self
            .radio
            .connect_to_network(&self.network, self.retry.association_timeout)
        {
            self.state = LinkState::Failed;
            return Err(BringUpError::RadioAssociationFailed {
                ssid: self.network.ssid.clone(),
                reason: format!("{:?}", e),
            });
        }

        log::info!("Connected.");
        self.delay.delay_ms(millis(self.retry.address_settle_delay));

        let ip = self.wait_for_address();
        log::info!("IP: {}", ip);
        self.state = LinkState::Associated(ip);
        Ok(ip)
    }

    /// Retry [`attempt`](Self::attempt) until the radio is up.
    ///
    /// Every attempt, the first one included, is preceded by the retry delay
    /// so the radio has settled after power-up or a dropped association.
    pub fn bring_up(&mut self) -> Ipv4Addr {
        loop {
            self.delay.delay_ms(millis(self.retry.association_retry_delay));
            match self.attempt() {
                Ok(ip) => return ip,
                Err(e) => log::warn!("{}", e),
            }
        }
    }

    /// Reuse the current association if it is still there
    pub fn ensure_associated(&mut self) -> Ipv4Addr {
        if self.radio.is_associated() {
            if let Ok(ip) = self.radio.assigned_address() {
                self.state = LinkState::Associated(ip);
                return ip;
            }
        }

        log::warn!("Radio association lost, bringing the link up again");
        self.state = LinkState::Unassociated;
        self.bring_up()
    }

    fn wait_for_address(&mut self) -> Ipv4Addr {
        loop {
            match self.radio.assigned_address() {
                Ok(ip) => return ip,
                Err(e) => {
                    log::warn!(
                        "{}",
                        BringUpError::AddressAcquisitionFailed(format!("{:?}", e))
                    );
                    self.delay.delay_ms(millis(self.retry.address_poll_interval));
                }
            }
        }
    }
}

pub(crate) fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}
