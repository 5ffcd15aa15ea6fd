//! Event bridge between background work and the presentation loop.
//!
//! Two sources feed the main loop:
//!
//! - **User Events**: keyboard and resize input read from the terminal on a
//!   dedicated thread.
//! - **App Events**: everything produced by the session worker thread and the
//!   AI request tasks.
//!
//! Background code never touches view state. It only sends [`AppEvent`]s; the
//! main loop is the single receiver and applies them in arrival order. The
//! channel is FIFO per sender, so events from one source are seen in the
//! order they were emitted.
//!
//! # Submodules
//!
//! - `input`: key handling for the command line and AI prompt

pub mod input;

use std::thread;

use std::io::Result;
use tokio::sync::mpsc::{self, Receiver, UnboundedReceiver, UnboundedSender};

use crate::ai::Suggestion;

/// Type alias for user input events from the terminal.
pub type UserEvent = crossterm::event::Event;

/// Sending half of the app event bridge, cloned into every producer.
pub type EventSink = UnboundedSender<AppEvent>;

/// Initializes the user event stream.
///
/// Spawns a thread that blocks on `crossterm::event::read()` and forwards
/// each event. The thread exits once the receiver is dropped.
pub fn init_user_event() -> Receiver<Result<UserEvent>> {
    let (tx, rx) = mpsc::channel(64);
    thread::spawn(move || {
        loop {
            if tx.blocking_send(crossterm::event::read()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Notifications from the session worker, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The worker started connecting to `target` (`user@host[:port]`).
    Connecting { target: String },
    /// Authenticated and the shell is open.
    Connected,
    /// A command was written to the channel (audit form).
    CommandSent(String),
    /// Decoded output read from the channel.
    ServerOutput(String),
    /// The session ended. Emitted at most once per session.
    Disconnected { reason: String },
}

/// Application-wide events delivered into the presentation loop.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum AppEvent {
    Session(SessionEvent),

    /// Outcome of one AI suggestion request.
    Suggestion(Suggestion),

    /// An audit record could not be written. The session keeps running.
    AuditFailed { message: String },
}

/// Initializes the application event bridge.
///
/// Unbounded so that producers on plain OS threads never block on a slow
/// UI; the presentation loop drains it on every wakeup.
pub fn init_app_eventsource() -> (EventSink, UnboundedReceiver<AppEvent>) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bridge_preserves_per_sender_order() {
        let (tx, mut rx) = init_app_eventsource();
        let worker_tx = tx.clone();

        let worker = thread::spawn(move || {
            for i in 0..100 {
                worker_tx
                    .send(AppEvent::Session(SessionEvent::ServerOutput(i.to_string())))
                    .unwrap();
            }
        });
        worker.join().unwrap();
        drop(tx);

        let mut expected = 0;
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Session(SessionEvent::ServerOutput(text)) => {
                    assert_eq!(text, expected.to_string());
                    expected += 1;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(expected, 100);
    }
}
