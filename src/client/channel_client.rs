use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, PoisonError},
};

use futures_util::StreamExt;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    Config, RelayEvent,
    client::{Backoff, ConnectionStatus, FrameAction, ReconnectMachine, Transport},
};

type EventSink = Arc<dyn Fn(RelayEvent) + Send + Sync + 'static>;

/// Keeps one cafe subscription alive for as long as it is wanted.
///
/// - `set_channel(Some(id))` starts (or restarts) the subscription.
/// - `set_channel(None)`, `close()` or dropping the client tears it down.
/// - `status()` / `watch_status()` expose the [`ConnectionStatus`].
///
/// Domain events are handed to the `on_event` callback in arrival order.
/// Handshake and unparseable frames never reach it.
///
/// Teardown is synchronous: once `close()` returns, the status is
/// `Disconnected`, the driver task is aborted, no reconnect is pending and
/// `on_event` is not called again. A call already in progress on another
/// thread is waited for, so `on_event` must not close or re-point the
/// client that invokes it.
pub struct ChannelClient<T: Transport> {
    transport: Arc<T>,
    backoff: Backoff,
    on_event: EventSink,
    status: Arc<StatusCell>,
    driver: Option<Driver>,
}

struct Driver {
    cafe_id: String,
    task: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Status channel guarded by a generation number, so that a driver which
/// has been torn down can no longer publish a status or an event.
struct StatusCell {
    generation: Mutex<u64>,
    sender: watch::Sender<ConnectionStatus>,
}

impl StatusCell {
    fn new() -> Self {
        let (sender, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            generation: Mutex::new(0),
            sender,
        }
    }

    fn set(&self, generation: u64, status: ConnectionStatus) {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == generation {
            self.sender.send_replace(status);
        }
    }

    /// Run `f` only while `generation` is current. The generation lock is
    /// held for the duration, so [`retire`](Self::retire) waits for it.
    fn dispatch(&self, generation: u64, f: impl FnOnce()) -> bool {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            return false;
        }
        f();
        drop(current);
        true
    }

    /// Invalidate the running driver and report `Disconnected`.
    fn retire(&self) -> u64 {
        let mut current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *current += 1;
        self.sender.send_replace(ConnectionStatus::Disconnected);
        *current
    }
}

impl<T: Transport> ChannelClient<T> {
    /// Create an idle client. Nothing connects until
    /// [`set_channel`](Self::set_channel) is given an id.
    pub fn new<F>(transport: T, config: &Config, on_event: F) -> Self
    where
        F: Fn(RelayEvent) + Send + Sync + 'static,
    {
        Self {
            transport: Arc::new(transport),
            backoff: Backoff::from_config(config),
            on_event: Arc::new(on_event),
            status: Arc::new(StatusCell::new()),
            driver: None,
        }
    }

    /// Create a client and immediately subscribe to `cafe_id`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn<F>(transport: T, cafe_id: Option<String>, config: &Config, on_event: F) -> Self
    where
        F: Fn(RelayEvent) + Send + Sync + 'static,
    {
        let mut client = Self::new(transport, config, on_event);
        client.set_channel(cafe_id);
        client
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.sender.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.sender.subscribe()
    }

    /// Cafe currently subscribed to, if any.
    pub fn cafe_id(&self) -> Option<&str> {
        self.driver.as_ref().map(|d| d.cafe_id.as_str())
    }

    /// Switch to another cafe, or to none. Any live connection and pending
    /// reconnect are dropped first; the new subscription starts with a
    /// fresh retry count.
    pub fn set_channel(&mut self, cafe_id: Option<String>) {
        if let (Some(driver), Some(next)) = (&self.driver, &cafe_id)
            && driver.cafe_id == *next
        {
            return;
        }

        let generation = self.teardown();
        let Some(cafe_id) = cafe_id else {
            return;
        };

        let cancel_token = CancellationToken::new();
        let context = DriverContext {
            transport: self.transport.clone(),
            machine: ReconnectMachine::new(self.backoff),
            on_event: self.on_event.clone(),
            status: self.status.clone(),
            generation,
            cafe_id: cafe_id.clone(),
        };
        let token = cancel_token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = context.run() => {}
            }
        });

        self.driver = Some(Driver {
            cafe_id,
            task,
            cancel_token,
        });
    }

    /// Tear the subscription down. Idempotent.
    pub fn close(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) -> u64 {
        let generation = self.status.retire();
        if let Some(driver) = self.driver.take() {
            driver.cancel_token.cancel();
            driver.task.abort();
            tracing::debug!(cafe_id = %driver.cafe_id, "Channel client torn down");
        }
        generation
    }
}

impl<T: Transport> Drop for ChannelClient<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

struct DriverContext<T: Transport> {
    transport: Arc<T>,
    machine: ReconnectMachine,
    on_event: EventSink,
    status: Arc<StatusCell>,
    generation: u64,
    cafe_id: String,
}

impl<T: Transport> DriverContext<T> {
    async fn run(mut self) {
        loop {
            match self.transport.connect(&self.cafe_id).await {
                Ok(mut frames) => {
                    self.machine.on_open();
                    self.status.set(self.generation, self.machine.status());
                    tracing::info!(cafe_id = %self.cafe_id, "Subscribed to cafe events");

                    while let Some(frame) = frames.next().await {
                        match frame {
                            Ok(data) => self.handle_frame(&data),
                            Err(e) => {
                                tracing::warn!(cafe_id = %self.cafe_id, error = %e, "Event stream failed");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(cafe_id = %self.cafe_id, error = %e, "Couldn't open event stream");
                }
            }

            let retry = self.machine.retry_count();
            let delay = self.machine.on_error();
            self.status.set(self.generation, self.machine.status());
            tracing::info!(
                cafe_id = %self.cafe_id,
                retry,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn handle_frame(&self, data: &str) {
        match self.machine.on_frame(data) {
            FrameAction::Forward(event) => {
                let dispatched = self.status.dispatch(self.generation, || {
                    let result = catch_unwind(AssertUnwindSafe(|| (self.on_event)(event)));
                    if result.is_err() {
                        tracing::error!(cafe_id = %self.cafe_id, "Event consumer panicked");
                    }
                });
                if !dispatched {
                    tracing::trace!(cafe_id = %self.cafe_id, "Dropping event for a retired subscription");
                }
            }
            FrameAction::Handshake => {
                tracing::trace!(cafe_id = %self.cafe_id, "Handshake received");
            }
            FrameAction::Malformed => {
                tracing::debug!(cafe_id = %self.cafe_id, "Dropping malformed frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures_util::stream;
    use tokio::time::{Instant, sleep, sleep_until};

    use super::*;
    use crate::{Error, Result, client::FrameStream};

    const DOORBELL: &str = r#"{"type":"doorbell","cafeId":"c1","payload":{"by":"ana"}}"#;

    enum Attempt {
        /// Deliver the frames and keep the connection open.
        Hold(Vec<&'static str>),
        /// Deliver the frames, then let the server end the stream.
        End(Vec<&'static str>),
    }

    /// Plays back one outcome per connection attempt; once the script runs
    /// out every attempt is refused.
    #[derive(Default)]
    struct ScriptedTransport {
        attempts: Arc<AtomicUsize>,
        script: Mutex<VecDeque<Attempt>>,
    }

    impl ScriptedTransport {
        fn with_script(script: Vec<Attempt>) -> Self {
            Self {
                attempts: Arc::default(),
                script: Mutex::new(script.into()),
            }
        }
    }

    impl Transport for ScriptedTransport {
        async fn connect(&self, _cafe_id: &str) -> Result<FrameStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let attempt = self.script.lock().unwrap().pop_front();
            let frames = |frames: Vec<&'static str>| {
                stream::iter(frames.into_iter().map(|f| Ok(f.to_string())))
            };
            match attempt {
                Some(Attempt::Hold(f)) => Ok(frames(f).chain(stream::pending()).boxed()),
                Some(Attempt::End(f)) => Ok(frames(f).boxed()),
                None => Err(Error::Transport("connection refused".into())),
            }
        }
    }

    fn collector() -> (
        Arc<Mutex<Vec<RelayEvent>>>,
        impl Fn(RelayEvent) + Send + Sync + 'static,
    ) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        (events, move |event| sink.lock().unwrap().push(event))
    }

    async fn wait_for(rx: &mut watch::Receiver<ConnectionStatus>, status: ConnectionStatus) {
        while *rx.borrow_and_update() != status {
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_and_forwards_domain_events_only() {
        let transport = ScriptedTransport::with_script(vec![Attempt::Hold(vec![
            r#"{"type":"connected","cafeId":"c1"}"#,
            "{broken",
            DOORBELL,
        ])]);
        let (events, on_event) = collector();
        let client =
            ChannelClient::spawn(transport, Some("c1".into()), &Config::default(), on_event);
        let mut rx = client.watch_status();

        wait_for(&mut rx, ConnectionStatus::Connected).await;
        sleep(Duration::from_millis(1)).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "doorbell");
        assert_eq!(client.status(), ConnectionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off_exponentially() {
        let transport = ScriptedTransport::default();
        let attempts = transport.attempts.clone();
        let (_, on_event) = collector();
        let _client =
            ChannelClient::spawn(transport, Some("c1".into()), &Config::default(), on_event);
        let start = Instant::now();

        // Waits of 1, 2, 4, 8, 16, 30 s put attempts at these offsets.
        for (at_ms, expected) in [
            (500, 1),
            (1500, 2),
            (3500, 3),
            (7500, 4),
            (15_500, 5),
            (31_500, 6),
            (61_500, 7),
            (91_500, 8),
        ] {
            sleep_until(start + Duration::from_millis(at_ms)).await;
            assert_eq!(attempts.load(Ordering::SeqCst), expected, "at {at_ms} ms");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_reconnecting_cancels_retry() {
        let transport = ScriptedTransport::default();
        let attempts = transport.attempts.clone();
        let (_, on_event) = collector();
        let mut client =
            ChannelClient::spawn(transport, Some("c1".into()), &Config::default(), on_event);
        let mut rx = client.watch_status();

        wait_for(&mut rx, ConnectionStatus::Reconnecting).await;
        let before = attempts.load(Ordering::SeqCst);

        client.close();
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert_eq!(client.cafe_id(), None);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), before);
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_stream_ends() {
        let transport = ScriptedTransport::with_script(vec![
            Attempt::End(vec![DOORBELL]),
            Attempt::Hold(vec![DOORBELL]),
        ]);
        let attempts = transport.attempts.clone();
        let (events, on_event) = collector();
        let client =
            ChannelClient::spawn(transport, Some("c1".into()), &Config::default(), on_event);
        let mut rx = client.watch_status();

        wait_for(&mut rx, ConnectionStatus::Reconnecting).await;
        let reconnecting_at = Instant::now();
        wait_for(&mut rx, ConnectionStatus::Connected).await;

        assert!(reconnecting_at.elapsed() >= Duration::from_millis(1000));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_channel_none_disconnects() {
        let transport = ScriptedTransport::with_script(vec![Attempt::Hold(vec![])]);
        let (_, on_event) = collector();
        let mut client =
            ChannelClient::spawn(transport, Some("c1".into()), &Config::default(), on_event);
        let mut rx = client.watch_status();
        wait_for(&mut rx, ConnectionStatus::Connected).await;

        client.set_channel(None);
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert_eq!(client.cafe_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_cafe_restarts_subscription() {
        let transport = ScriptedTransport::with_script(vec![
            Attempt::Hold(vec![]),
            Attempt::Hold(vec![]),
        ]);
        let attempts = transport.attempts.clone();
        let (_, on_event) = collector();
        let mut client =
            ChannelClient::spawn(transport, Some("c1".into()), &Config::default(), on_event);
        let mut rx = client.watch_status();
        wait_for(&mut rx, ConnectionStatus::Connected).await;

        client.set_channel(Some("c1".into()));
        assert_eq!(client.status(), ConnectionStatus::Connected);

        client.set_channel(Some("c2".into()));
        assert_eq!(client.cafe_id(), Some("c2"));
        wait_for(&mut rx, ConnectionStatus::Connected).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_waits_for_in_flight_event() {
        let transport = ScriptedTransport::with_script(vec![Attempt::Hold(vec![DOORBELL, DOORBELL])]);
        let entered = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let on_event = {
            let entered = entered.clone();
            let finished = finished.clone();
            move |_: RelayEvent| {
                entered.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(200));
                finished.fetch_add(1, Ordering::SeqCst);
            }
        };
        let mut client =
            ChannelClient::spawn(transport, Some("c1".into()), &Config::default(), on_event);

        while entered.load(Ordering::SeqCst) == 0 {
            sleep(Duration::from_millis(1)).await;
        }
        client.close();

        // The running call completed before close returned, and the
        // second frame was never handed over.
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(entered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idle_client_is_disconnected() {
        let (_, on_event) = collector();
        let client = ChannelClient::new(ScriptedTransport::default(), &Config::default(), on_event);
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert_eq!(client.cafe_id(), None);
    }
}
