use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl OutboundError {
    /// Failures of the transport itself, as opposed to a response the server
    /// chose to send.
    pub fn is_transport(&self) -> bool {
        matches!(self, OutboundError::Connection(_) | OutboundError::Timeout(_))
    }
}

impl From<reqwest::Error> for OutboundError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OutboundError::Timeout(err.to_string())
        } else if err.is_builder() {
            OutboundError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            OutboundError::Decode(err.to_string())
        } else {
            OutboundError::Connection(err.to_string())
        }
    }
}
