//! Simulated hardware for the unit tests
//!
//! All fakes share one [`EventLog`] so tests can assert on the interleaving of
//! radio, broker, panel and delay calls. Sleeping advances a virtual clock
//! instead of blocking.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use embedded_graphics::prelude::Point;
use embedded_hal::delay::DelayNs;

use crate::battery::BatteryAdc;
use crate::clock::Clock;
use crate::config::WifiNetwork;
use crate::display::Panel;
use crate::session::{Broker, SessionError};
use crate::wifi::Radio;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Clear,
    ClearBuffer,
    Draw(String, Point),
    Commit,
    Sleep(u32),
    Associate(String),
    Connect(String),
    Subscribe(String),
    KeepAlive(Duration),
    Disconnect,
}

#[derive(Default)]
struct SimState {
    events: Vec<Event>,
    now: Duration,
}

#[derive(Clone, Default)]
pub struct EventLog {
    inner: Rc<RefCell<SimState>>,
}

impl EventLog {
    pub fn push(&self, event: Event) {
        self.inner.borrow_mut().events.push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.borrow().events.clone()
    }

    pub fn draws(&self) -> Vec<(String, Point)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Draw(text, at) => Some((text, at)),
                _ => None,
            })
            .collect()
    }

    pub fn slept_ms(&self) -> u32 {
        self.events()
            .iter()
            .map(|e| match e {
                Event::Sleep(ms) => *ms,
                _ => 0,
            })
            .sum()
    }

    pub fn keep_alives(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::KeepAlive(at) => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, wanted: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events().iter().position(wanted)
    }

    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    pub fn advance(&self, by: Duration) {
        self.inner.borrow_mut().now += by;
    }
}

pub struct FakeDelay {
    log: EventLog,
}

impl FakeDelay {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl Clone for FakeDelay {
    fn clone(&self) -> Self {
        Self::new(self.log.clone())
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.advance(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.push(Event::Sleep(ms));
        self.log.advance(Duration::from_millis(u64::from(ms)));
    }
}

pub struct FakeClock {
    log: EventLog,
}

impl FakeClock {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.log.now()
    }
}

pub struct RecordingPanel {
    log: EventLog,
    pub fail_clear: bool,
    pub fail_draws: bool,
}

impl RecordingPanel {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_clear: false,
            fail_draws: false,
        }
    }
}

impl Panel for RecordingPanel {
    type Error = &'static str;

    fn clear(&mut self) -> Result<(), Self::Error> {
        if self.fail_clear {
            return Err("busy timeout");
        }
        self.log.push(Event::Clear);
        Ok(())
    }

    fn clear_buffer(&mut self) -> Result<(), Self::Error> {
        self.log.push(Event::ClearBuffer);
        Ok(())
    }

    fn draw_text(&mut self, text: &str, baseline: Point) -> Result<(), Self::Error> {
        if self.fail_draws {
            return Err("spi write");
        }
        self.log.push(Event::Draw(text.to_string(), baseline));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.log.push(Event::Commit);
        Ok(())
    }
}

/// Radio that fails association a set number of times
pub struct ScriptedRadio {
    log: EventLog,
    pub association_failures: u32,
    pub address_failures: u32,
    pub associated: bool,
    pub ip: Ipv4Addr,
}

impl ScriptedRadio {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            association_failures: 0,
            address_failures: 0,
            associated: false,
            ip: Ipv4Addr::new(192, 168, 1, 42),
        }
    }
}

impl Radio for ScriptedRadio {
    type Error = &'static str;

    fn connect_to_network(
        &mut self,
        network: &WifiNetwork,
        _timeout: Duration,
    ) -> Result<(), Self::Error> {
        self.log.push(Event::Associate(network.ssid.clone()));
        if self.association_failures > 0 {
            self.association_failures -= 1;
            return Err("no AP found");
        }
        self.associated = true;
        Ok(())
    }

    fn assigned_address(&mut self) -> Result<Ipv4Addr, Self::Error> {
        if self.address_failures > 0 {
            self.address_failures -= 1;
            return Err("dhcp pending");
        }
        Ok(self.ip)
    }

    fn is_associated(&mut self) -> bool {
        self.associated
    }

    fn mac_address(&mut self) -> Result<[u8; 6], Self::Error> {
        Ok([0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56])
    }
}

/// What the broker does on the next `next_message` call
pub enum Inbound {
    Message(Vec<u8>),
    Idle,
    Lost,
}

pub struct ScriptedBroker {
    log: EventLog,
    pub inbound: VecDeque<Inbound>,
    pub keep_alive_results: VecDeque<Result<(), SessionError>>,
    pub connect_results: VecDeque<Result<(), SessionError>>,
    pub subscribe_results: VecDeque<Result<(), SessionError>>,
}

impl ScriptedBroker {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            inbound: VecDeque::new(),
            keep_alive_results: VecDeque::new(),
            connect_results: VecDeque::new(),
            subscribe_results: VecDeque::new(),
        }
    }
}

impl Broker for ScriptedBroker {
    fn connect(&mut self, _url: &str, client_id: &str, _timeout: Duration) -> Result<(), SessionError> {
        self.log.push(Event::Connect(client_id.to_string()));
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    fn subscribe(&mut self, topic: &str, _timeout: Duration) -> Result<(), SessionError> {
        self.log.push(Event::Subscribe(topic.to_string()));
        self.subscribe_results.pop_front().unwrap_or(Ok(()))
    }

    fn publish_keep_alive(&mut self, _topic: &str) -> Result<(), SessionError> {
        self.log.push(Event::KeepAlive(self.log.now()));
        self.keep_alive_results.pop_front().unwrap_or(Ok(()))
    }

    fn next_message(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SessionError> {
        match self.inbound.pop_front() {
            Some(Inbound::Message(payload)) => Ok(Some(payload)),
            Some(Inbound::Lost) => Err(SessionError::ConnectionLost),
            Some(Inbound::Idle) | None => {
                self.log.advance(timeout);
                Ok(None)
            }
        }
    }

    fn disconnect(&mut self) {
        self.log.push(Event::Disconnect);
    }
}

pub struct FixedAdc(pub u16);

impl BatteryAdc for FixedAdc {
    type Error = core::convert::Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        Ok(self.0)
    }
}
