use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use log::{debug, info, warn};

use crate::inbox::Inbox;
use crate::payload::MAX_PAYLOAD_BYTES;
use crate::session::{Broker, SessionError};

/// Events kept between the connection pump and the session
const EVENT_QUEUE_DEPTH: usize = 4;

/// MQTT protocol keep-alive, independent of the status publish
const PROTOCOL_KEEP_ALIVE: Duration = Duration::from_secs(30);

const KEEP_ALIVE_MESSAGE: &[u8] = b"alive";

/// Owned copy of the connection events the session cares about
#[derive(Debug)]
enum MqttEvent {
    Connected,
    Disconnected,
    Subscribed(u32),
    Received(Vec<u8>),
    Error(String),
}

impl MqttEvent {
    /// A newer track update makes an older one worthless
    fn is_superseded(&self) -> bool {
        matches!(self, MqttEvent::Received(_))
    }
}

struct Link {
    client: EspMqttClient<'static>,
    events: Arc<Inbox<MqttEvent>>,
}

/// MQTT broker connection on top of the ESP-IDF client.
///
/// A fresh client is created for every connect. Its connection is drained by
/// a dedicated thread into a bounded [`Inbox`], so inbound messages wait there
/// while the session is busy rendering. The thread runs inside the client's
/// event dispatch, which holds the client lock, so it never blocks on a full
/// inbox; the oldest queued track update is dropped instead.
#[derive(Default)]
pub struct EspBroker {
    link: Option<Link>,
}

impl EspBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn link(&mut self) -> Result<&mut Link, SessionError> {
        self.link.as_mut().ok_or(SessionError::NotConnected)
    }
}

fn spawn_pump(
    mut connection: EspMqttConnection,
    client_id: &str,
) -> Result<Arc<Inbox<MqttEvent>>, SessionError> {
    let inbox = Arc::new(Inbox::new(EVENT_QUEUE_DEPTH));
    let tx = Arc::clone(&inbox);

    thread::Builder::new()
        .name(format!("mqtt-{}", client_id))
        .stack_size(6000)
        .spawn(move || {
            debug!("MQTT pump started");
            while let Ok(event) = connection.next() {
                let event = match event.payload() {
                    EventPayload::Connected(_) => MqttEvent::Connected,
                    EventPayload::Disconnected => MqttEvent::Disconnected,
                    EventPayload::Subscribed(id) => MqttEvent::Subscribed(id),
                    EventPayload::Received {
                        data,
                        details: Details::Complete,
                        ..
                    } => MqttEvent::Received(data.to_vec()),
                    EventPayload::Received { .. } => {
                        warn!("Dropping fragmented MQTT message");
                        continue;
                    }
                    EventPayload::Error(e) => MqttEvent::Error(format!("{:?}", e)),
                    _ => continue,
                };
                if let Some(dropped) = tx.push(event, MqttEvent::is_superseded) {
                    debug!("Inbox full, dropped {:?}", dropped);
                }
            }
            tx.close();
            debug!("MQTT pump stopped");
        })
        .map_err(|e| SessionError::ProtocolError(format!("spawning MQTT pump: {}", e)))?;

    Ok(inbox)
}

/// Wait for an event matching `accept`, skipping everything else
fn wait_for<T>(
    events: &Inbox<MqttEvent>,
    timeout: Duration,
    mut accept: impl FnMut(MqttEvent) -> Option<Result<T, String>>,
) -> Result<T, String> {
    let deadline = Instant::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(left) {
            Ok(event) => {
                if let Some(result) = accept(event) {
                    return result;
                }
            }
            Err(RecvTimeoutError::Timeout) => return Err(format!("no answer within {:?}", timeout)),
            Err(RecvTimeoutError::Disconnected) => return Err("connection closed".to_string()),
        }
    }
}

impl Broker for EspBroker {
    fn connect(&mut self, url: &str, client_id: &str, timeout: Duration) -> Result<(), SessionError> {
        self.disconnect();

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            keep_alive_interval: Some(PROTOCOL_KEEP_ALIVE),
            buffer_size: MAX_PAYLOAD_BYTES,
            ..Default::default()
        };
        let (client, connection) = EspMqttClient::new(url, &conf)
            .map_err(|e| SessionError::BrokerUnreachable(e.to_string()))?;
        let events = spawn_pump(connection, client_id)?;

        wait_for(&events, timeout, |event| match event {
            MqttEvent::Connected => Some(Ok(())),
            MqttEvent::Disconnected => Some(Err("refused".to_string())),
            MqttEvent::Error(e) => Some(Err(e)),
            _ => None,
        })
        .map_err(SessionError::BrokerUnreachable)?;

        info!("MQTT connected");
        self.link = Some(Link { client, events });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, timeout: Duration) -> Result<(), SessionError> {
        let link = self.link()?;
        let rejected = |reason: String| SessionError::SubscriptionRejected {
            topic: topic.to_string(),
            reason,
        };

        let id = link
            .client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| rejected(e.to_string()))?;

        wait_for(&link.events, timeout, |event| match event {
            MqttEvent::Subscribed(acked) if acked == id => Some(Ok(())),
            MqttEvent::Disconnected => Some(Err("connection closed".to_string())),
            MqttEvent::Error(e) => Some(Err(e)),
            _ => None,
        })
        .map_err(rejected)
    }

    fn publish_keep_alive(&mut self, topic: &str) -> Result<(), SessionError> {
        self.link()?
            .client
            .publish(topic, QoS::AtMostOnce, false, KEEP_ALIVE_MESSAGE)
            .map(|_| ())
            .map_err(|e| SessionError::ProtocolError(e.to_string()))
    }

    fn next_message(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SessionError> {
        let link = self.link()?;
        match link.events.recv_timeout(timeout) {
            Ok(MqttEvent::Received(data)) => Ok(Some(data)),
            Ok(MqttEvent::Disconnected) | Err(RecvTimeoutError::Disconnected) => {
                Err(SessionError::ConnectionLost)
            }
            Ok(MqttEvent::Error(e)) => {
                warn!("MQTT error: {}", e);
                Ok(None)
            }
            Ok(MqttEvent::Connected) | Ok(MqttEvent::Subscribed(_)) => Ok(None),
            Err(RecvTimeoutError::Timeout) => Ok(None),
        }
    }

    fn disconnect(&mut self) {
        // dropping the client stops the connection and ends the pump thread
        if self.link.take().is_some() {
            info!("MQTT client dropped");
        }
    }
}
