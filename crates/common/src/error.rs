use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures talking to the quote service
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed quote body: {body:?}")]
    Malformed { body: String },

    #[error("failed to build quote client: {source}")]
    Client {
        #[source]
        source: BoxError,
    },
}

/// The chat platform rejected an update
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("nickname update in guild {guild} rejected: {reason}")]
    Nickname { guild: String, reason: String },

    #[error("presence update rejected: {reason}")]
    Presence { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Recoverable: the caller substitutes `default`
    #[error("invalid {key} value {value:?}, using default {default}")]
    InvalidValue {
        key: &'static str,
        value: String,
        default: String,
    },

    #[error("{key} must be set")]
    Missing { key: &'static str },
}
