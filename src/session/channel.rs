//! The seam between the session worker and the remote shell transport.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::error::{ChannelIoError, ConnectError};

/// Everything needed to open one remote shell.
#[derive(Clone)]
pub struct SessionParams {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub known_hosts: PathBuf,
    pub trust_on_first_use: bool,
}

impl SessionParams {
    pub fn from_config(config: &SessionConfig, password: String) -> Self {
        Self {
            host: config.host.clone(),
            user: config.user.clone(),
            password,
            port: config.port,
            connect_timeout: config.connect_timeout,
            known_hosts: config.known_hosts.clone(),
            trust_on_first_use: config.trust_on_first_use,
        }
    }

    /// `user@host` or `user@host:port` when the port is not 22.
    pub fn target(&self) -> String {
        if self.port == 22 {
            format!("{}@{}", self.user, self.host)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.port)
        }
    }
}

// Keep the password out of debug output.
impl fmt::Debug for SessionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .field("known_hosts", &self.known_hosts)
            .field("trust_on_first_use", &self.trust_on_first_use)
            .finish()
    }
}

/// A live interactive shell. Owned and driven by exactly one worker thread.
pub trait ShellChannel: Send {
    /// Transmit all of `data`.
    fn send(&mut self, data: &[u8]) -> Result<(), ChannelIoError>;

    /// Whether output can be read without blocking.
    fn recv_ready(&mut self) -> Result<bool, ChannelIoError>;

    /// Read up to `max` bytes of available output.
    fn recv(&mut self, max: usize) -> Result<Vec<u8>, ChannelIoError>;

    /// Release the channel and the underlying connection. Must tolerate
    /// being called more than once.
    fn close(&mut self);
}

/// Opens shells. Blocks until authenticated or failed.
pub trait Connector: Send + 'static {
    fn connect(&self, params: &SessionParams) -> Result<Box<dyn ShellChannel>, ConnectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(port: u16) -> SessionParams {
        SessionParams {
            host: "example.org".to_string(),
            user: "admin".to_string(),
            password: "hunter2".to_string(),
            port,
            connect_timeout: Duration::from_secs(10),
            known_hosts: PathBuf::from("/tmp/known_hosts"),
            trust_on_first_use: false,
        }
    }

    #[test]
    fn test_target_omits_default_port() {
        assert_eq!(params(22).target(), "admin@example.org");
        assert_eq!(params(2222).target(), "admin@example.org:2222");
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", params(22));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
