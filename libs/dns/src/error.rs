//! Error types for record synthesis.

use thiserror::Error;

/// Errors that can occur while producing a record set.
#[derive(Debug, Error)]
pub enum DnsError {
    /// The record set could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
