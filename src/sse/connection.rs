use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use futures_util::{
    Stream, StreamExt,
    stream::{self, BoxStream},
};
use tokio::{
    sync::mpsc::{UnboundedReceiver, unbounded_channel},
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Bus, ChannelKey, RelayEvent, Subscription, sse::frame};

/// Shortest heartbeat period; a zero period is not a valid timer.
const MIN_HEARTBEAT: Duration = Duration::from_millis(1);

/// Lifecycle of one SSE connection. There is no way back from `Closed`;
/// a client that reconnects gets a fresh connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Open,
    Closed,
}

/// Byte stream for one client subscribed to one cafe channel.
///
/// Yields the handshake frame, then every event published on the cafe's
/// channel in publish order, with a `:ping` heartbeat whenever
/// `heartbeat_interval` elapses. The stream ends when `shutdown` fires.
///
/// Dropping the stream (the HTTP layer does this when the client goes
/// away) stops the heartbeat timer and unsubscribes from the bus.
pub struct SseConnection {
    id: Uuid,
    cafe_id: Arc<str>,
    inner: BoxStream<'static, Bytes>,
}

struct Session {
    id: Uuid,
    channel: ChannelKey,
    handshake: Option<Bytes>,
    frames: UnboundedReceiver<Bytes>,
    heartbeat: Interval,
    shutdown: CancellationToken,
    subscription: Option<Subscription<RelayEvent>>,
    state: ConnectionState,
}

impl SseConnection {
    pub fn open(
        bus: &Bus<RelayEvent>,
        cafe_id: &str,
        heartbeat_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let id = Uuid::new_v4();
        let channel = ChannelKey::cafe(cafe_id);
        let (tx, rx) = unbounded_channel::<Bytes>();

        let subscription = bus.subscribe(channel.clone(), move |event: &RelayEvent| {
            match frame::data_frame(event) {
                // The receiver is gone only once the connection is closing.
                Ok(bytes) => {
                    let _ = tx.send(bytes);
                }
                Err(e) => tracing::warn!(connection = %id, error = %e, "Dropping unencodable event"),
            }
        });

        let handshake = match frame::handshake(cafe_id) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "Couldn't encode handshake");
                None
            }
        };

        let heartbeat_interval = heartbeat_interval.max(MIN_HEARTBEAT);
        let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(connection = %id, channel = %channel, "SSE connection opened");

        let session = Session {
            id,
            channel,
            handshake,
            frames: rx,
            heartbeat,
            shutdown,
            subscription: Some(subscription),
            state: ConnectionState::Open,
        };

        Self {
            id,
            cafe_id: cafe_id.into(),
            inner: stream::unfold(session, Session::next_frame).boxed(),
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn cafe_id(&self) -> &str {
        &self.cafe_id
    }
}

impl Stream for SseConnection {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Session {
    async fn next_frame(mut self) -> Option<(Bytes, Self)> {
        if let Some(handshake) = self.handshake.take() {
            return Some((handshake, self));
        }

        let frame = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            Some(bytes) = self.frames.recv() => Some(bytes),
            _ = self.heartbeat.tick() => Some(frame::heartbeat()),
        };

        match frame {
            Some(bytes) => Some((bytes, self)),
            None => {
                self.close();
                None
            }
        }
    }

    /// Unsubscribe and mark the session closed. Runs at most once and
    /// cannot fail; the heartbeat timer goes with the session.
    fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.frames.close();
        tracing::debug!(connection = %self.id, channel = %self.channel, "SSE connection closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
