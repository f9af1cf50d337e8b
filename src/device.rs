//! Device context and supervisor
//!
//! Everything the firmware touches is owned here, built once at startup from
//! the configuration and the hardware adapters.

use embedded_hal::delay::DelayNs;

use crate::battery::{BatteryAdc, BatterySampler};
use crate::clock::Clock;
use crate::config::DeviceConfig;
use crate::display::{DisplaySequencer, Panel};
use crate::layout::LayoutConfig;
use crate::payload;
use crate::session::{Broker, MessagingSession, SessionError};
use crate::state::ConnectionState;
use crate::wifi::{millis, NetworkBringUp, Radio};

/// Hardware adapters handed to [`Device::new`]
pub struct Capabilities<R, B, P, A> {
    pub radio: R,
    pub broker: B,
    pub panel: P,
    pub battery_adc: A,
}

pub struct Device<R, B, P, A, C, D> {
    config: DeviceConfig,
    network: NetworkBringUp<R, D>,
    session: MessagingSession<B, C>,
    display: DisplaySequencer<P, D>,
    battery: BatterySampler<A>,
    delay: D,
    state: ConnectionState,
    client_id: Option<String>,
}

impl<R, B, P, A, C, D> Device<R, B, P, A, C, D>
where
    R: Radio,
    B: Broker,
    P: Panel,
    A: BatteryAdc,
    C: Clock,
    D: DelayNs + Clone,
{
    pub fn new(
        config: DeviceConfig,
        hw: Capabilities<R, B, P, A>,
        clock: C,
        delay: D,
        layout: LayoutConfig,
    ) -> Self {
        Self {
            network: NetworkBringUp::new(
                hw.radio,
                delay.clone(),
                config.wifi.clone(),
                config.retry,
            ),
            session: MessagingSession::new(hw.broker, clock, config.broker.clone(), config.retry),
            display: DisplaySequencer::new(hw.panel, delay.clone(), layout),
            battery: BatterySampler::new(hw.battery_adc, config.board.battery()),
            delay,
            state: ConnectionState::default(),
            client_id: None,
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Supervisor loop, never returns
    pub fn run(&mut self) -> ! {
        self.show_boot_status();
        loop {
            if let Err(e) = self.step_session() {
                log::error!("{}", e);
            }
        }
    }

    /// Put something on the panel so a dead device is distinguishable from
    /// one that is still joining the network
    pub fn show_boot_status(&mut self) {
        let status = format!("Joining {}...", self.config.wifi.ssid);
        if let Err(e) = self.display.show_status(&status) {
            log::error!("{}", e);
        }
    }

    /// One supervisor pass: make sure the link is up, open the session and
    /// serve it until it is lost.
    ///
    /// Connect and subscribe failures back off before returning so the next
    /// pass does not hammer the broker.
    pub fn step_session(&mut self) -> Result<(), SessionError> {
        let ip = self.network.ensure_associated();
        self.state.transition(ConnectionState::Associated(ip));

        if let Err(e) = self.open_session() {
            self.session.disconnect();
            log::error!("mqtt connect: {}", e);
            self.delay.delay_ms(millis(self.config.retry.broker_backoff));
            return Err(e);
        }
        self.state.transition(ConnectionState::SessionActive);

        let display = &mut self.display;
        let battery = &mut self.battery;
        let reason = self
            .session
            .run(|payload| handle_payload(payload, display, battery));

        self.session.disconnect();
        self.state.transition(ConnectionState::SessionLost);
        Err(reason)
    }

    fn open_session(&mut self) -> Result<(), SessionError> {
        let client_id = self.client_id()?;
        self.session.connect(&client_id)?;
        self.session.subscribe()
    }

    fn client_id(&mut self) -> Result<String, SessionError> {
        if let Some(id) = &self.client_id {
            return Ok(id.clone());
        }
        let mac = self
            .network
            .radio_mut()
            .mac_address()
            .map_err(|e| SessionError::ProtocolError(format!("no station MAC: {:?}", e)))?;
        let id = self.config.broker.client_id(mac);
        self.client_id = Some(id.clone());
        Ok(id)
    }
}

/// Decode one inbound payload and put it on the panel.
///
/// A payload that does not decode leaves the previous frame in place.
fn handle_payload<P, D, A>(
    payload: &[u8],
    display: &mut DisplaySequencer<P, D>,
    battery: &mut BatterySampler<A>,
) where
    P: Panel,
    D: DelayNs,
    A: BatteryAdc,
{
    let track = match payload::decode(payload) {
        Ok(track) => track,
        Err(e) => {
            log::warn!("Dropping message, keeping previous frame: {}", e);
            return;
        }
    };
    log::info!("artist: {}", track.artist);
    log::info!("track: {}", track.title);

    let reading = battery.sample();
    if let Err(e) = display.render_track(&track, &reading) {
        log::error!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardVariant;
    use crate::config::{BrokerConfig, RetryPolicy, WifiNetwork};
    use crate::display::{Rotation, CLEAR_SETTLE_MS, COMMIT_SETTLE_MS};
    use crate::testing::{
        Event, EventLog, FakeClock, FakeDelay, FixedAdc, Inbound, RecordingPanel, ScriptedBroker,
        ScriptedRadio,
    };
    use std::net::Ipv4Addr;

    type TestDevice =
        Device<ScriptedRadio, ScriptedBroker, RecordingPanel, FixedAdc, FakeClock, FakeDelay>;

    fn config() -> DeviceConfig {
        DeviceConfig {
            wifi: WifiNetwork::new("home", "hunter22").unwrap(),
            broker: BrokerConfig::new("mqtt://10.0.0.2:1883", "sonos/current_track", "np")
                .unwrap(),
            retry: RetryPolicy::default(),
            board: BoardVariant::LolinD32,
            rotation: Rotation::Deg0,
        }
    }

    fn device(log: &EventLog, radio: ScriptedRadio, broker: ScriptedBroker) -> TestDevice {
        Device::new(
            config(),
            Capabilities {
                radio,
                broker,
                panel: RecordingPanel::new(log.clone()),
                battery_adc: FixedAdc(2400),
            },
            FakeClock::new(log.clone()),
            FakeDelay::new(log.clone()),
            LayoutConfig::for_panel(400, 300, 10, 20),
        )
    }

    #[test]
    fn session_connect_waits_for_association() {
        let log = EventLog::default();
        let mut radio = ScriptedRadio::new(log.clone());
        radio.association_failures = 2;
        let mut broker = ScriptedBroker::new(log.clone());
        broker.inbound.push_back(Inbound::Lost);
        let mut dev = device(&log, radio, broker);

        let err = dev.step_session().unwrap_err();

        assert_eq!(err, SessionError::ConnectionLost);
        let associations = log
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Associate(_)))
            .count();
        assert_eq!(associations, 3);
        let last_associate = log
            .events()
            .iter()
            .rposition(|e| matches!(e, Event::Associate(_)))
            .unwrap();
        let connect = log.position(|e| matches!(e, Event::Connect(_))).unwrap();
        assert!(last_associate < connect);
        assert_eq!(dev.state(), ConnectionState::SessionLost);
    }

    #[test]
    fn inbound_track_is_rendered_with_battery_footer() {
        let log = EventLog::default();
        let mut radio = ScriptedRadio::new(log.clone());
        radio.associated = true;
        let mut broker = ScriptedBroker::new(log.clone());
        broker.inbound.extend([
            Inbound::Message(br#"{"Artist":"Nina Simone","Title":"Sinnerman"}"#.to_vec()),
            Inbound::Idle,
            Inbound::Lost,
        ]);
        let mut dev = device(&log, radio, broker);

        let _ = dev.step_session();

        let texts: Vec<String> = log.draws().into_iter().map(|(t, _)| t).collect();
        assert_eq!(texts, ["Nina Simone", "Sinnerman", "VBat: 4.25 (960)"]);
        assert_eq!(log.slept_ms(), CLEAR_SETTLE_MS + COMMIT_SETTLE_MS);
        assert_eq!(
            log.events().iter().filter(|e| **e == Event::Commit).count(),
            1
        );
    }

    #[test]
    fn malformed_payload_does_not_touch_the_panel() {
        let log = EventLog::default();
        let mut radio = ScriptedRadio::new(log.clone());
        radio.associated = true;
        let mut broker = ScriptedBroker::new(log.clone());
        broker.inbound.extend([
            Inbound::Message(br#"{"Artist":"Nina Simone"}"#.to_vec()),
            Inbound::Idle,
            Inbound::Lost,
        ]);
        let mut dev = device(&log, radio, broker);

        let _ = dev.step_session();

        assert!(!log
            .events()
            .iter()
            .any(|e| matches!(e, Event::Clear | Event::Draw(..) | Event::Commit)));
    }

    #[test]
    fn broker_failure_backs_off_and_reconnects_on_next_pass() {
        let log = EventLog::default();
        let mut radio = ScriptedRadio::new(log.clone());
        radio.associated = true;
        let mut broker = ScriptedBroker::new(log.clone());
        broker
            .connect_results
            .push_back(Err(SessionError::BrokerUnreachable("refused".into())));
        broker.inbound.push_back(Inbound::Lost);
        let mut dev = device(&log, radio, broker);

        let first = dev.step_session().unwrap_err();
        assert!(matches!(first, SessionError::BrokerUnreachable(_)));
        assert_eq!(dev.state(), ConnectionState::Associated(Ipv4Addr::new(192, 168, 1, 42)));
        assert_eq!(log.slept_ms(), 5000);

        let second = dev.step_session().unwrap_err();
        assert_eq!(second, SessionError::ConnectionLost);

        let connects: Vec<Event> = log
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Connect(_)))
            .collect();
        assert_eq!(
            connects,
            [
                Event::Connect("np-240ac4123456".into()),
                Event::Connect("np-240ac4123456".into()),
            ]
        );
    }

    #[test]
    fn subscription_rejection_is_reported() {
        let log = EventLog::default();
        let mut radio = ScriptedRadio::new(log.clone());
        radio.associated = true;
        let mut broker = ScriptedBroker::new(log.clone());
        broker
            .subscribe_results
            .push_back(Err(SessionError::SubscriptionRejected {
                topic: "sonos/current_track".into(),
                reason: "not authorized".into(),
            }));
        let mut dev = device(&log, radio, broker);

        let err = dev.step_session().unwrap_err();

        assert!(matches!(err, SessionError::SubscriptionRejected { .. }));
        assert!(log.events().contains(&Event::Disconnect));
        assert_ne!(dev.state(), ConnectionState::SessionActive);
    }

    #[test]
    fn boot_status_names_the_network() {
        let log = EventLog::default();
        let mut dev = device(
            &log,
            ScriptedRadio::new(log.clone()),
            ScriptedBroker::new(log.clone()),
        );

        dev.show_boot_status();

        assert_eq!(log.draws().len(), 1);
        assert_eq!(log.draws()[0].0, "Joining home...");
        assert_eq!(log.events().last(), Some(&Event::Commit));
    }
}
