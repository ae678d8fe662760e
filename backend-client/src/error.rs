use reqwest::Method;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{method} {url} failed: {source}")]
    Request {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} failed: {status}; body={body}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("decode error for {url}: {source}; body={body}")]
    Decode {
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
}
