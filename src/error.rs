//! Error definitions for the reporting engine itself.
//!
//! These are programming defects or transport/config problems, never the
//! user-facing aggregate failures (see [`crate::aggregate`]).

use thiserror::Error;

#[derive(Debug, Error)]
/// Top-level error type returned by engine APIs.
pub enum EngineError {
    /// A collector was used after it was finalized.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// A report could not back the requested aggregate type.
    #[error("invalid report: {0}")]
    InvalidReport(String),
    /// Invalid engine configuration value.
    #[error("config error: {0}")]
    ConfigError(String),
    /// Transport envelope could not be decoded or failed verification.
    #[error("transport error: {0}")]
    TransportError(String),
    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    SerializationError(String),
    /// Filesystem I/O error from the CLI or callers that propagate I/O.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
