//! MQTT session and liveness loop
//!
//! One topic is subscribed. The loop sends a keep-alive every
//! [`RetryPolicy::keep_alive_interval`] and waits for inbound messages in
//! between, so a message only interrupts the wait and never runs in parallel
//! with a keep-alive. Rendering a message takes several seconds of mandatory
//! panel delays, a tick that falls due meanwhile is sent right after.

use std::time::Duration;

use thiserror::Error;

use crate::clock::Clock;
use crate::config::{BrokerConfig, RetryPolicy};

/// Broker connection as seen by the session
pub trait Broker {
    fn connect(&mut self, url: &str, client_id: &str, timeout: Duration)
        -> Result<(), SessionError>;

    fn subscribe(&mut self, topic: &str, timeout: Duration) -> Result<(), SessionError>;

    fn publish_keep_alive(&mut self, topic: &str) -> Result<(), SessionError>;

    /// Next inbound payload on the subscribed topic, waits at most `timeout`
    fn next_message(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SessionError>;

    fn disconnect(&mut self);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("broker unreachable: {0}")]
    BrokerUnreachable(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("subscription to {topic:?} rejected: {reason}")]
    SubscriptionRejected { topic: String, reason: String },
    #[error("keep-alive failed {0} times in a row")]
    KeepAliveFailed(u32),
    #[error("broker connection lost")]
    ConnectionLost,
    #[error("no active session")]
    NotConnected,
}

pub struct MessagingSession<B, C> {
    broker: B,
    clock: C,
    config: BrokerConfig,
    retry: RetryPolicy,
    status_topic: Option<String>,
    next_keep_alive: Duration,
    keep_alive_failures: u32,
}

impl<B, C> MessagingSession<B, C>
where
    B: Broker,
    C: Clock,
{
    pub fn new(broker: B, clock: C, config: BrokerConfig, retry: RetryPolicy) -> Self {
        Self {
            broker,
            clock,
            config,
            retry,
            status_topic: None,
            next_keep_alive: Duration::ZERO,
            keep_alive_failures: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status_topic.is_some()
    }

    pub fn connect(&mut self, client_id: &str) -> Result<(), SessionError> {
        log::info!(
            "Connecting to MQTT broker at {} as {}",
            self.config.url,
            client_id
        );
        self.broker
            .connect(&self.config.url, client_id, self.retry.broker_timeout)?;

        self.status_topic = Some(self.config.status_topic(client_id));
        self.keep_alive_failures = 0;
        // first keep-alive goes out right away
        self.next_keep_alive = self.clock.now();
        Ok(())
    }

    pub fn subscribe(&mut self) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        log::info!("Subscribing to {}", self.config.topic);
        self.broker
            .subscribe(&self.config.topic, self.retry.broker_timeout)
    }

    pub fn disconnect(&mut self) {
        if self.status_topic.take().is_some() {
            self.broker.disconnect();
        }
    }

    /// One pass of the liveness loop.
    ///
    /// Sends the keep-alive when due, otherwise waits for a message until the
    /// next keep-alive is due. Queued messages are collapsed and only the
    /// newest is passed to `on_message`. An error means the session is gone.
    pub fn poll<H>(&mut self, mut on_message: H) -> Result<(), SessionError>
    where
        H: FnMut(&[u8]),
    {
        let Some(status_topic) = self.status_topic.as_deref() else {
            return Err(SessionError::NotConnected);
        };

        let now = self.clock.now();
        if now >= self.next_keep_alive {
            self.next_keep_alive = now + self.retry.keep_alive_interval;

            return match self.broker.publish_keep_alive(status_topic) {
                Ok(()) => {
                    log::debug!("Keep-alive sent");
                    self.keep_alive_failures = 0;
                    Ok(())
                }
                Err(e) => {
                    self.keep_alive_failures += 1;
                    log::warn!(
                        "ping: {} ({} of {})",
                        e,
                        self.keep_alive_failures,
                        self.retry.max_keep_alive_failures
                    );
                    if self.keep_alive_failures >= self.retry.max_keep_alive_failures {
                        Err(SessionError::KeepAliveFailed(self.keep_alive_failures))
                    } else {
                        Ok(())
                    }
                }
            };
        }

        let Some(mut payload) = self.broker.next_message(self.next_keep_alive - now)? else {
            return Ok(());
        };

        let mut skipped = 0;
        let drained = loop {
            match self.broker.next_message(Duration::ZERO) {
                Ok(Some(newer)) => {
                    payload = newer;
                    skipped += 1;
                }
                Ok(None) => break Ok(()),
                // the payload in hand is still the latest track, show it first
                Err(e) => break Err(e),
            }
        };
        if skipped > 0 {
            log::info!("Skipped {} stale track updates", skipped);
        }

        on_message(&payload);
        drained
    }

    /// Run the liveness loop until the session is lost, returning why
    pub fn run<H>(&mut self, mut on_message: H) -> SessionError
    where
        H: FnMut(&[u8]),
    {
        loop {
            if let Err(e) = self.poll(&mut on_message) {
                log::error!("Session ended: {}", e);
                return e;
            }
        }
    }
}
