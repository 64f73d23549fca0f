use std::{net::SocketAddr, str::FromStr, time::Duration};

/// Runtime configuration for the bus, the SSE endpoint and the client.
///
/// Use the builder methods to customize, [`Default`] for the stock values,
/// or [`Config::from_env`] to let the deployment override them.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use dream_relay::Config;
///
/// let config = Config::default()
///     .with_max_listeners(250)
///     .with_heartbeat_interval(Duration::from_secs(15));
/// assert_eq!(config.max_listeners, 250);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener count per channel above which the bus logs a warning.
    /// This is a soft threshold; registration never fails.
    /// Default: 100
    pub max_listeners: usize,

    /// Interval between `:ping` comment frames on an idle SSE stream.
    /// Default: 30 s
    pub heartbeat_interval: Duration,

    /// First reconnect delay of the client. Doubles on every consecutive failure.
    /// Default: 1 s
    pub backoff_base: Duration,

    /// Upper bound of the client reconnect delay.
    /// Default: 30 s
    pub backoff_cap: Duration,

    /// Address the server binary listens on.
    /// Default: 0.0.0.0:3001
    pub bind_addr: SocketAddr,

    /// Base URL the HTTP client transport connects to.
    /// Default: http://127.0.0.1:3001
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_listeners: 100,
            heartbeat_interval: Duration::from_secs(30),
            backoff_base: Duration::from_millis(1000),
            backoff_cap: Duration::from_millis(30_000),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            base_url: "http://127.0.0.1:3001".to_string(),
        }
    }
}

impl Config {
    /// Start from the defaults and apply any `DREAM_RELAY_*` overrides
    /// present in the environment.
    ///
    /// Unparsable values are reported and ignored.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(addr) = env_parse::<SocketAddr>("DREAM_RELAY_BIND") {
            config.bind_addr = addr;
        }
        if let Ok(url) = std::env::var("DREAM_RELAY_BASE_URL")
            && !url.trim().is_empty()
        {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(ms) = env_parse::<u64>("DREAM_RELAY_HEARTBEAT_MS") {
            config.heartbeat_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(max) = env_parse::<usize>("DREAM_RELAY_MAX_LISTENERS") {
            config.max_listeners = max;
        }
        config
    }

    /// Set the soft per-channel listener threshold.
    pub fn with_max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// Set the SSE heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the reconnect backoff base delay and its cap.
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}
