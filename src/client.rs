//! Self-healing subscriber for a cafe's SSE stream.
//!
//! [`ChannelClient`] keeps one subscription alive, reconnecting with
//! capped exponential [`Backoff`] and exposing a [`ConnectionStatus`] for
//! UI. The decision logic lives in the pure [`ReconnectMachine`]; the
//! network side sits behind [`Transport`].

mod backoff;
mod channel_client;
#[cfg(feature = "client")]
mod http;
mod machine;
mod status;
mod transport;

pub use backoff::Backoff;
pub use channel_client::ChannelClient;
#[cfg(feature = "client")]
pub use http::HttpTransport;
pub use machine::{FrameAction, ReconnectMachine};
pub use status::ConnectionStatus;
pub use transport::{FrameStream, Transport};
