use std::path::PathBuf;

use thiserror::Error;

/// Errors of one synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot access {endpoint}: status {status}, {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {endpoint}: {source}")]
    InvalidResponse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported user authentication type '{0}'")]
    UnsupportedAuth(String),

    #[error("missing credentials for {0} authentication")]
    MissingCredentials(&'static str),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] serde_json::Error),
}
