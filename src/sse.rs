//! Server-Sent Events plumbing: wire codec, per-connection stream and
//! (with the `server` feature) the axum routes.

mod connection;
mod decoder;
pub mod frame;
#[cfg(feature = "server")]
mod routes;

pub use connection::SseConnection;
pub use decoder::{DEFAULT_MAX_LINE_LEN, FrameDecoder};
#[cfg(feature = "server")]
pub use routes::{AppState, router};
