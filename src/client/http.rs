use std::time::Duration;

use futures_util::{StreamExt, stream};
use reqwest::{StatusCode, Url, header};

use crate::{
    Config, Error, Result,
    client::{FrameStream, Transport},
    sse::FrameDecoder,
};

/// [`Transport`] speaking to the relay's `GET /api/cafe/{id}/events`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Transport(e.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.base_url)
    }

    fn events_url(&self, cafe_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Transport(format!("{} can't be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "cafe", cafe_id, "events"]);
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn connect(&self, cafe_id: &str) -> Result<FrameStream> {
        let url = self.events_url(cafe_id)?;
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let mut decoder = FrameDecoder::new();
        let frames = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.feed(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(Error::from(e))],
            })
            .flat_map(stream::iter);
        Ok(frames.boxed())
    }
}
