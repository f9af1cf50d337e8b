//! Connection state shared by the bring-up and session code

use std::fmt;
use std::net::Ipv4Addr;

/// Where the device is on the way from power-on to receiving track updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unassociated,
    Associated(Ipv4Addr),
    SessionActive,
    SessionLost,
}

impl ConnectionState {
    /// Move to `next`, logging the transition.
    ///
    /// A session can only become active on top of an associated radio.
    pub fn transition(&mut self, next: ConnectionState) {
        if next == ConnectionState::SessionActive
            && !matches!(self, ConnectionState::Associated(_))
        {
            log::error!("Refusing {} -> {}: radio not associated", self, next);
            return;
        }
        if *self != next {
            log::info!("Connection state: {} -> {}", self, next);
            *self = next;
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Unassociated => f.write_str("unassociated"),
            ConnectionState::Associated(ip) => write!(f, "associated ({})", ip),
            ConnectionState::SessionActive => f.write_str("session active"),
            ConnectionState::SessionLost => f.write_str("session lost"),
        }
    }
}
