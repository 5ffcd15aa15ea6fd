//! Error types for the session core.
//!
//! Every expected failure is a value: connection setup, channel I/O, audit
//! writes, suggestion round trips and configuration each get their own enum.
//! Application glue wraps them in `anyhow` where they end up fatal.

use std::path::PathBuf;
use std::time::Duration;

/// Failure while establishing the remote session. Fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    #[error("host key verification failed for {host}: {reason}")]
    HostKey { host: String, reason: String },

    #[error("authentication failed for {user}: {reason}")]
    Auth { user: String, reason: String },

    #[error("failed to open shell channel: {0}")]
    Channel(String),
}

/// Read or write failure on an established channel. Ends the drain loop.
#[derive(Debug, thiserror::Error)]
pub enum ChannelIoError {
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote closed the channel")]
    Closed,
}

/// Failure to append an audit record. Reported, never fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum LogWriteError {
    #[error("failed to open audit log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write audit log: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Any failure in the AI suggestion round trip.
#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("completion API error: {0}")]
    Api(String),

    #[error("completion API returned no command")]
    EmptyResponse,

    #[error("completion API did not answer within {0:?}")]
    Timeout(Duration),

    #[error("failed to build completion request: {0}")]
    Build(String),
}

impl From<async_openai::error::OpenAIError> for SuggestionError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        SuggestionError::Api(err.to_string())
    }
}

/// Configuration and credential resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("credential unavailable: {0}")]
    Credential(String),
}
