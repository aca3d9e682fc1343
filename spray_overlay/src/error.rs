use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to one of the backend's JSON endpoints.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid backend url `{0}`")]
    InvalidUrl(String),
    #[error("could not build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} answered {status}")]
    Status { path: &'static str, status: StatusCode },
    #[error("could not decode response from {path}: {source}")]
    Decode {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure while reading the MJPEG feed.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream url `{0}`")]
    InvalidUrl(String),
    #[error("stream content type `{0}` is not multipart")]
    NotMultipart(String),
    #[error("multipart stream has no boundary parameter")]
    MissingBoundary,
    #[error("stream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("stream answered {0}")]
    Status(StatusCode),
    #[error("could not decode frame: {0}")]
    Decode(#[from] image::ImageError),
}

/// Outcome of a user-initiated action that did not succeed.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Request(#[from] ClientError),
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("could not load config: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("invalid value for {key}: `{value}`")]
    ConfigValue { key: &'static str, value: String },
    #[error("could not load label font {path}: {reason}")]
    Font { path: String, reason: String },
    #[error(transparent)]
    Client(#[from] ClientError),
}
