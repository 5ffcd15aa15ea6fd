//! Audit record schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout of the audit file: UTC, microseconds, no offset suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// What an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditKind {
    #[serde(rename = "USER_COMMAND")]
    UserCommand,
    #[serde(rename = "SERVER_OUTPUT")]
    ServerOutput,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::UserCommand => "USER_COMMAND",
            AuditKind::ServerOutput => "SERVER_OUTPUT",
        }
    }
}

/// One line of the audit file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: AuditKind,
    pub text: String,
}

impl AuditEvent {
    /// Stamp an event with the current wall clock.
    pub fn now(kind: AuditKind, text: impl Into<String>) -> Self {
        Self::at(Utc::now(), kind, text)
    }

    pub fn at(time: DateTime<Utc>, kind: AuditKind, text: impl Into<String>) -> Self {
        Self {
            timestamp: time.format(TIMESTAMP_FORMAT).to_string(),
            kind,
            text: text.into(),
        }
    }

    /// Serialize as a single JSON line including the trailing newline.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
