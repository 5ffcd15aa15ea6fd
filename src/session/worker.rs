//! The session worker: one OS thread per remote shell.
//!
//! The thread connects, then runs the drain loop until `close()` is called or
//! the channel fails. Each iteration flushes the dispatch queue to the channel
//! and then reads whatever output is ready. Every command is audit-logged
//! before it is written, and every output chunk is audit-logged before it is
//! forwarded to the presentation loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::audit::{AuditKind, AuditLogger};
use crate::error::ChannelIoError;
use crate::event::{AppEvent, EventSink, SessionEvent};

use super::channel::{Connector, SessionParams, ShellChannel};
use super::queue::{Command, DispatchQueue};
use super::{DEFAULT_MAX_CHUNK, DEFAULT_POLL_INTERVAL};

/// Reason reported when the session ends because the user closed it.
pub const CLOSED_BY_USER: &str = "session closed";

/// Lifecycle of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnected(String),
}

impl SessionState {
    fn can_advance_to(&self, next: &SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Connecting, SessionState::Connected)
                | (SessionState::Connecting, SessionState::Disconnected(_))
                | (SessionState::Connected, SessionState::Disconnected(_))
        )
    }
}

/// State owned by the worker thread for the lifetime of one attempt.
#[derive(Debug)]
pub struct Session {
    target: String,
    state: SessionState,
}

impl Session {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Move forward. Backwards or repeated transitions are refused.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if self.state.can_advance_to(&next) {
            debug!("Session {} {:?} -> {:?}", self.target, self.state, next);
            self.state = next;
            true
        } else {
            false
        }
    }
}

/// Drain loop tuning.
#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Longest idle wait between probes when nothing moved.
    pub poll_interval: Duration,
    /// Upper bound for a single read.
    pub max_chunk: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_chunk: DEFAULT_MAX_CHUNK,
        }
    }
}

/// Handle to a running session worker.
///
/// Commands go in through [`SessionHandle::send`]; everything coming back
/// arrives as [`AppEvent::Session`] on the event bridge. Dropping the handle
/// closes the session.
pub struct SessionHandle {
    queue: DispatchQueue,
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
}

impl SessionHandle {
    /// Queue a command for transmission.
    pub fn send(&self, cmd: impl Into<Command>) {
        self.queue.push(cmd);
    }

    /// Producer handle to the dispatch queue.
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Ask the worker to stop at its next loop boundary. Idempotent.
    pub fn close(&self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            info!("Session close requested");
            self.queue.wake();
        }
    }

    pub fn is_closing(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        matches!(self.done.try_recv(), Err(mpsc::TryRecvError::Disconnected))
    }

    /// Wait for the worker thread to exit, up to `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.done.recv_timeout(timeout),
            Err(mpsc::RecvTimeoutError::Disconnected)
        )
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for the worker thread.
pub struct SessionWorker<C: Connector> {
    connector: C,
    params: SessionParams,
    audit: AuditLogger,
    events: EventSink,
    options: WorkerOptions,
}

impl<C: Connector> SessionWorker<C> {
    pub fn new(connector: C, params: SessionParams, audit: AuditLogger, events: EventSink) -> Self {
        Self {
            connector,
            params,
            audit,
            events,
            options: WorkerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    /// Start the worker thread. Connection happens on that thread.
    pub fn spawn(self) -> std::io::Result<SessionHandle> {
        let queue = DispatchQueue::new();
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = mpsc::channel::<()>();

        let runner = Runner {
            connector: self.connector,
            params: self.params,
            audit: self.audit,
            events: self.events,
            options: self.options,
            queue: queue.clone(),
            stop: stop.clone(),
        };

        thread::Builder::new()
            .name("session-worker".to_string())
            .spawn(move || {
                // Dropped when the thread exits, which is what `done` observes.
                let _done_tx = done_tx;
                runner.run();
            })?;

        Ok(SessionHandle { queue, stop, done })
    }
}

struct Runner<C: Connector> {
    connector: C,
    params: SessionParams,
    audit: AuditLogger,
    events: EventSink,
    options: WorkerOptions,
    queue: DispatchQueue,
    stop: Arc<AtomicBool>,
}

impl<C: Connector> Runner<C> {
    fn run(self) {
        let mut session = Session::new(self.params.target());
        self.emit(SessionEvent::Connecting {
            target: session.target().to_string(),
        });
        info!("Connecting to {}", session.target());

        let mut channel = match self.connector.connect(&self.params) {
            Ok(channel) => channel,
            Err(e) => {
                error!("Connection to {} failed: {}", session.target(), e);
                self.finish(&mut session, e.to_string());
                return;
            }
        };

        if self.stop.load(Ordering::SeqCst) {
            channel.close();
            self.finish(&mut session, CLOSED_BY_USER.to_string());
            return;
        }

        if session.advance(SessionState::Connected) {
            self.emit(SessionEvent::Connected);
        }

        let reason = self.drain_loop(channel.as_mut());
        channel.close();
        self.finish(&mut session, reason);
    }

    /// Runs until stopped or the channel fails; returns the disconnect reason.
    fn drain_loop(&self, channel: &mut dyn ShellChannel) -> String {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return CLOSED_BY_USER.to_string();
            }

            let mut moved = false;

            for cmd in self.queue.drain_all() {
                moved = true;
                if let Err(e) = self.transmit(channel, &cmd) {
                    warn!("Send failed: {}", e);
                    return e.to_string();
                }
            }

            match self.read_output(channel) {
                Ok(read) => moved |= read,
                Err(e) => {
                    warn!("Read failed: {}", e);
                    return e.to_string();
                }
            }

            if !moved {
                self.queue.wait_for_push(self.options.poll_interval);
            }
        }
    }

    fn transmit(&self, channel: &mut dyn ShellChannel, cmd: &Command) -> Result<(), ChannelIoError> {
        let line = cmd.normalized();
        let text = cmd.audit_text();
        self.audit(AuditKind::UserCommand, text);
        channel.send(line.as_bytes())?;
        debug!("Sent {} bytes", line.len());
        self.emit(SessionEvent::CommandSent(text.to_string()));
        Ok(())
    }

    /// Returns whether a non-empty chunk was forwarded.
    fn read_output(&self, channel: &mut dyn ShellChannel) -> Result<bool, ChannelIoError> {
        if !channel.recv_ready()? {
            return Ok(false);
        }
        let bytes = channel.recv(self.options.max_chunk)?;
        let text = String::from_utf8_lossy(&bytes);
        if text.is_empty() {
            return Ok(false);
        }
        self.audit(AuditKind::ServerOutput, &text);
        self.emit(SessionEvent::ServerOutput(text.into_owned()));
        Ok(true)
    }

    fn audit(&self, kind: AuditKind, text: &str) {
        if let Err(e) = self.audit.record(kind, text) {
            error!("Audit write failed ({}): {}", kind.as_str(), e);
            self.send_event(AppEvent::AuditFailed {
                message: e.to_string(),
            });
        }
    }

    fn finish(&self, session: &mut Session, reason: String) {
        if session.advance(SessionState::Disconnected(reason.clone())) {
            info!("Session {} disconnected: {}", session.target(), reason);
            self.emit(SessionEvent::Disconnected { reason });
        }
    }

    fn emit(&self, event: SessionEvent) {
        self.send_event(AppEvent::Session(event));
    }

    fn send_event(&self, event: AppEvent) {
        if self.events.send(event).is_err() {
            debug!("Event bridge closed; dropping session event");
        }
    }
}
