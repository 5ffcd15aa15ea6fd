//! Command dispatch queue between producers and the session worker.
//!
//! Any thread may push; only the session worker drains. Draining takes the
//! whole backlog under one lock so a concurrent push lands either in this
//! batch or the next, never both and never reordered.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A line of shell input as entered by a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text as transmitted: trailing line breaks collapsed to exactly one `\n`.
    pub fn normalized(&self) -> String {
        let mut line = self.0.trim_end_matches(['\n', '\r']).to_string();
        line.push('\n');
        line
    }

    /// Text as recorded in the audit log.
    pub fn audit_text(&self) -> &str {
        self.0.trim()
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Unbounded multi-producer FIFO of commands. Clones share the same queue.
#[derive(Clone, Default)]
pub struct DispatchQueue {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    pending: Mutex<VecDeque<Command>>,
    pushed: Condvar,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command. Never blocks beyond the internal lock.
    pub fn push(&self, cmd: impl Into<Command>) {
        self.shared.pending.lock().push_back(cmd.into());
        self.shared.pushed.notify_one();
    }

    /// Remove and return everything queued, oldest first.
    pub fn drain_all(&self) -> Vec<Command> {
        let mut pending = self.shared.pending.lock();
        pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.pending.lock().is_empty()
    }

    /// Block until something is queued, `wake` is called, or `timeout` elapses.
    ///
    /// Returns `true` if commands are pending on return.
    pub fn wait_for_push(&self, timeout: Duration) -> bool {
        let mut pending = self.shared.pending.lock();
        if pending.is_empty() {
            self.shared.pushed.wait_for(&mut pending, timeout);
        }
        !pending.is_empty()
    }

    /// Wake a consumer blocked in `wait_for_push` without queueing anything.
    pub fn wake(&self) {
        self.shared.pushed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_normalize_adds_missing_newline() {
        assert_eq!(Command::new("ls -la").normalized(), "ls -la\n");
    }

    #[test]
    fn test_normalize_collapses_trailing_newlines() {
        assert_eq!(Command::new("ls\n").normalized(), "ls\n");
        assert_eq!(Command::new("ls\n\n\n").normalized(), "ls\n");
        assert_eq!(Command::new("ls\r\n\r\n").normalized(), "ls\n");
    }

    #[test]
    fn test_normalize_keeps_inner_newlines() {
        assert_eq!(Command::new("a\nb\n\n").normalized(), "a\nb\n");
    }

    #[test]
    fn test_audit_text_is_trimmed() {
        assert_eq!(Command::new("  ls -la \n").audit_text(), "ls -la");
    }

    #[test]
    fn test_drain_returns_push_order_then_empty() {
        let queue = DispatchQueue::new();
        queue.push("one");
        queue.push("two");
        queue.push("three");

        let drained: Vec<_> = queue.drain_all().into_iter().map(|c| c.0).collect();
        assert_eq!(drained, vec!["one", "two", "three"]);
        assert!(queue.drain_all().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clones_share_the_queue() {
        let queue = DispatchQueue::new();
        let producer = queue.clone();
        producer.push("whoami");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_all(), vec![Command::new("whoami")]);
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let queue = DispatchQueue::new();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.push(format!("{p}:{i}"));
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while seen.len() < 1000 {
            seen.extend(queue.drain_all());
            thread::yield_now();
        }
        for producer in producers {
            producer.join().unwrap();
        }
        seen.extend(queue.drain_all());

        assert_eq!(seen.len(), 1000);
        for p in 0..4 {
            let order: Vec<usize> = seen
                .iter()
                .filter_map(|c| {
                    let (who, idx) = c.as_str().split_once(':')?;
                    (who == p.to_string()).then(|| idx.parse().unwrap())
                })
                .collect();
            assert_eq!(order, (0..250).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_wait_for_push_times_out_when_idle() {
        let queue = DispatchQueue::new();
        let start = Instant::now();
        assert!(!queue.wait_for_push(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_wait_for_push_wakes_on_push() {
        let queue = DispatchQueue::new();
        let producer = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push("date");
        });

        let start = Instant::now();
        assert!(queue.wait_for_push(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_returns_immediately_with_backlog() {
        let queue = DispatchQueue::new();
        queue.push("uptime");
        assert!(queue.wait_for_push(Duration::from_secs(5)));
    }
}
