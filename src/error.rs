use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {0} from event stream")]
    HttpStatus(u16),

    #[error("Couldn't (de)serialize the event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid event: {0}")]
    InvalidEvent(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Error external to the relay occured: {0}")]
    External(Arc<str>),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::HttpStatus(status.as_u16()),
            None => Error::Transport(e.to_string()),
        }
    }
}

impl Error {
    /// Whether the failure came from the network side of a connection
    /// rather than from the data travelling over it.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::HttpStatus(_) | Error::IOError(_)
        )
    }
}
