use std::future::Future;

use futures_util::stream::BoxStream;

use crate::Result;

/// Data payloads of one open SSE connection, in arrival order.
///
/// The stream ending, or yielding an `Err`, means the connection is gone.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Opens the SSE stream of a cafe.
///
/// Implement it as an `async fn`; no `#[async_trait]` is needed.
/// [`HttpTransport`](crate::client::HttpTransport) is the production
/// implementation; tests plug in scripted ones.
pub trait Transport: Send + Sync + 'static {
    /// Resolves once the server accepted the subscription.
    fn connect(&self, cafe_id: &str) -> impl Future<Output = Result<FrameStream>> + Send;
}
