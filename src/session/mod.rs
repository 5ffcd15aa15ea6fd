//! Remote shell session management.
//!
//! This module owns the remote side of the application:
//! - `queue`: the dispatch queue commands travel through
//! - `channel`: the transport seam (`Connector` / `ShellChannel`)
//! - `ssh`: the libssh2-backed transport
//! - `worker`: the thread that runs the drain loop

mod channel;
mod queue;
mod ssh;
mod worker;

use std::time::Duration;

pub use channel::{Connector, SessionParams, ShellChannel};
pub use queue::{Command, DispatchQueue};
pub use ssh::{Ssh2Channel, Ssh2Connector};
pub use worker::{
    CLOSED_BY_USER, Session, SessionHandle, SessionState, SessionWorker, WorkerOptions,
};

/// Largest single read from the channel.
pub const DEFAULT_MAX_CHUNK: usize = 65535;

/// Idle wait between output probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Connect timeout when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
