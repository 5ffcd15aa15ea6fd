//! SSH transport backed by libssh2.
//!
//! Connection setup runs in blocking mode with the configured timeout. Once the
//! shell is up the session is switched to non-blocking so the drain loop can
//! probe for output without stalling on an idle remote.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::Duration;

use ssh2::{CheckResult, KnownHostFileKind, KnownHostKeyFormat, Session};
use tracing::{debug, info, warn};

use crate::error::{ChannelIoError, ConnectError};

use super::channel::{Connector, SessionParams, ShellChannel};

const TERM_TYPE: &str = "xterm";
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(2);

/// Opens interactive shells with password authentication.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2Connector;

impl Connector for Ssh2Connector {
    fn connect(&self, params: &SessionParams) -> Result<Box<dyn ShellChannel>, ConnectError> {
        let timeout = params.connect_timeout;
        let tcp = connect_tcp(&params.host, params.port, timeout)?;

        let mut session = Session::new().map_err(|e| ConnectError::Handshake(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session.handshake().map_err(|e| {
            if is_timeout(&e) {
                ConnectError::Timeout(timeout)
            } else {
                ConnectError::Handshake(e.to_string())
            }
        })?;

        verify_host_key(&session, params)?;

        session
            .userauth_password(&params.user, &params.password)
            .map_err(|e| ConnectError::Auth {
                user: params.user.clone(),
                reason: e.message().to_string(),
            })?;
        if !session.authenticated() {
            return Err(ConnectError::Auth {
                user: params.user.clone(),
                reason: "server did not accept the credential".to_string(),
            });
        }

        let mut channel = session
            .channel_session()
            .map_err(|e| ConnectError::Channel(e.to_string()))?;
        channel
            .request_pty(TERM_TYPE, None, None)
            .map_err(|e| ConnectError::Channel(e.to_string()))?;
        channel
            .shell()
            .map_err(|e| ConnectError::Channel(e.to_string()))?;

        session.set_blocking(false);
        info!("Shell opened on {}", params.target());

        Ok(Box::new(Ssh2Channel {
            session,
            channel,
            pending: Vec::new(),
            closed: false,
        }))
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, ConnectError> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) if e.kind() == ErrorKind::TimedOut => return Err(ConnectError::Timeout(timeout)),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(match last_err {
        Some(e) => ConnectError::Io(e),
        None => ConnectError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            format!("no address found for {host}"),
        )),
    })
}

fn is_timeout(err: &ssh2::Error) -> bool {
    matches!(err.code(), ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT))
}

/// Name of a host as written in `known_hosts`.
fn known_hosts_name(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    }
}

fn verify_host_key(session: &Session, params: &SessionParams) -> Result<(), ConnectError> {
    let host_err = |reason: String| ConnectError::HostKey {
        host: params.host.clone(),
        reason,
    };

    let (key, key_type) = session
        .host_key()
        .ok_or_else(|| host_err("server presented no host key".to_string()))?;
    let mut known = session.known_hosts().map_err(|e| host_err(e.to_string()))?;

    let path = params.known_hosts.as_path();
    if path.exists() {
        known
            .read_file(path, KnownHostFileKind::OpenSSH)
            .map_err(|e| host_err(format!("cannot read {}: {}", path.display(), e)))?;
    }

    match known.check_port(&params.host, params.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::Mismatch => Err(host_err(
            "host key does not match the known_hosts entry".to_string(),
        )),
        CheckResult::Failure => Err(host_err("host key check failed".to_string())),
        CheckResult::NotFound if params.trust_on_first_use => {
            let name = known_hosts_name(&params.host, params.port);
            let format: KnownHostKeyFormat = key_type.into();
            known
                .add(&name, key, "added by remote-pilot", format)
                .map_err(|e| host_err(e.to_string()))?;
            persist_known_hosts(&known, path).map_err(host_err)?;
            warn!(
                "Trusting previously unknown host key for {} (trust_on_first_use); saved to {}",
                name,
                path.display()
            );
            Ok(())
        }
        CheckResult::NotFound => Err(host_err(format!(
            "host is not in {} and trust_on_first_use is disabled",
            path.display()
        ))),
    }
}

fn persist_known_hosts(known: &ssh2::KnownHosts, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    known
        .write_file(path, KnownHostFileKind::OpenSSH)
        .map_err(|e| e.to_string())
}

/// Interactive shell on a non-blocking libssh2 session.
pub struct Ssh2Channel {
    session: Session,
    channel: ssh2::Channel,
    /// Bytes read while probing for readiness, handed out by `recv`.
    pending: Vec<u8>,
    closed: bool,
}

impl Ssh2Channel {
    fn fill_pending(&mut self, max: usize) -> Result<(), ChannelIoError> {
        let mut buf = vec![0u8; max.max(1)];
        match self.channel.read(&mut buf) {
            Ok(0) => {
                if self.channel.eof() {
                    Err(ChannelIoError::Closed)
                } else {
                    Ok(())
                }
            }
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if self.channel.eof() {
                    Err(ChannelIoError::Closed)
                } else {
                    Ok(())
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(ChannelIoError::Io(e)),
        }
    }
}

impl ShellChannel for Ssh2Channel {
    fn send(&mut self, data: &[u8]) -> Result<(), ChannelIoError> {
        let mut written = 0;
        while written < data.len() {
            match self.channel.write(&data[written..]) {
                Ok(0) => return Err(ChannelIoError::Closed),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(WRITE_RETRY_DELAY),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(ChannelIoError::Io(e)),
            }
        }
        loop {
            match self.channel.flush() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(WRITE_RETRY_DELAY),
                Err(e) => return Err(ChannelIoError::Io(e)),
            }
        }
    }

    fn recv_ready(&mut self) -> Result<bool, ChannelIoError> {
        if self.pending.is_empty() {
            self.fill_pending(super::DEFAULT_MAX_CHUNK)?;
        }
        Ok(!self.pending.is_empty())
    }

    fn recv(&mut self, max: usize) -> Result<Vec<u8>, ChannelIoError> {
        if self.pending.is_empty() {
            self.fill_pending(max)?;
        }
        let take = self.pending.len().min(max);
        Ok(self.pending.drain(..take).collect())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // May report EAGAIN on a non-blocking session; the socket drops anyway.
        if let Err(e) = self.channel.close() {
            debug!("Channel close: {}", e);
        }
        if let Err(e) = self.session.disconnect(None, "session closed", None) {
            debug!("Session disconnect: {}", e);
        }
    }
}

impl Drop for Ssh2Channel {
    fn drop(&mut self) {
        self.close();
    }
}
