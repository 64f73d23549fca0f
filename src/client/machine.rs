use std::time::Duration;

use crate::{
    RelayEvent,
    client::{Backoff, ConnectionStatus},
};

/// What to do with one data frame received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAction {
    /// A domain event for the consumer.
    Forward(RelayEvent),
    /// The `connected` handshake; not a domain event.
    Handshake,
    /// Not a parseable event. Dropped, the connection stays up.
    Malformed,
}

/// Transition logic of the client, free of I/O and timers.
///
/// ```text
/// Disconnected --open--> Connected --error--> Reconnecting --open--> Connected
///                                              |    ^
///                                              +----+ error
/// ```
///
/// A machine lives as long as one subscription; the client drops it on
/// teardown, which is where `Disconnected` comes back.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    backoff: Backoff,
    retry_count: u32,
    status: ConnectionStatus,
}

impl ReconnectMachine {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            retry_count: 0,
            status: ConnectionStatus::Disconnected,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The transport opened successfully.
    pub fn on_open(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.retry_count = 0;
    }

    /// The transport failed or ended. Returns how long to wait before the
    /// next attempt.
    pub fn on_error(&mut self) -> Duration {
        let delay = self.backoff.delay(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        self.status = ConnectionStatus::Reconnecting;
        delay
    }

    pub fn on_frame(&self, data: &str) -> FrameAction {
        match serde_json::from_str::<RelayEvent>(data) {
            Ok(event) if event.is_handshake() => FrameAction::Handshake,
            Ok(event) => FrameAction::Forward(event),
            Err(_) => FrameAction::Malformed,
        }
    }
}

impl Default for ReconnectMachine {
    fn default() -> Self {
        Self::new(Backoff::default())
    }
}
