//! Off-loop suggestion requests.
//!
//! Each call to [`SuggestionWorker::request`] spawns one task that makes one
//! completion call and delivers exactly one [`Suggestion`] over the event
//! bridge. Requests are not serialized. Every request gets an increasing id
//! so the presentation loop can drop results that arrive after a newer
//! request was issued.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{error, info};

use crate::config::AiConfig;
use crate::error::SuggestionError;
use crate::event::{AppEvent, EventSink};

use super::backend::{CompletionBackend, OpenAiBackend};
use super::prompt::{SYSTEM_PROMPT, strip_code_fence};

pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionOutcome {
    Ok,
    Error,
}

/// Result of one request. On `Error`, `result` carries the diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub id: RequestId,
    pub prompt: String,
    pub result: String,
    pub outcome: SuggestionOutcome,
}

impl Suggestion {
    fn from_result(id: RequestId, prompt: String, result: Result<String, SuggestionError>) -> Self {
        match result {
            Ok(command) => Self {
                id,
                prompt,
                result: command,
                outcome: SuggestionOutcome::Ok,
            },
            Err(e) => Self {
                id,
                prompt,
                result: e.to_string(),
                outcome: SuggestionOutcome::Error,
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == SuggestionOutcome::Ok
    }
}

/// Ask the backend for a command and clean up the reply.
pub async fn suggest(
    backend: &dyn CompletionBackend,
    prompt: &str,
    timeout: Duration,
) -> Result<String, SuggestionError> {
    let raw = tokio::time::timeout(timeout, backend.complete(SYSTEM_PROMPT, prompt))
        .await
        .map_err(|_| SuggestionError::Timeout(timeout))??;

    let command = strip_code_fence(&raw);
    if command.is_empty() {
        return Err(SuggestionError::EmptyResponse);
    }
    Ok(command)
}

pub struct SuggestionWorker {
    backend: Arc<dyn CompletionBackend>,
    events: EventSink,
    timeout: Duration,
    last_id: AtomicU64,
}

impl SuggestionWorker {
    pub fn new(backend: Arc<dyn CompletionBackend>, events: EventSink, timeout: Duration) -> Self {
        Self {
            backend,
            events,
            timeout,
            last_id: AtomicU64::new(0),
        }
    }

    /// Worker backed by the OpenAI API as configured.
    pub fn from_config(config: &AiConfig, events: EventSink) -> Self {
        let backend = OpenAiBackend::new(config);
        info!("AI suggestions use model {}", backend.model());
        Self::new(Arc::new(backend), events, config.timeout)
    }

    /// Start a request. Must be called from within a tokio runtime.
    pub fn request(&self, prompt: impl Into<String>) -> RequestId {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let prompt = prompt.into();
        let backend = self.backend.clone();
        let events = self.events.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let result = suggest(backend.as_ref(), &prompt, timeout).await;
            if let Err(e) = &result {
                error!("Suggestion request {} failed: {}", id, e);
            }
            let suggestion = Suggestion::from_result(id, prompt, result);
            if events.send(AppEvent::Suggestion(suggestion)).is_err() {
                tracing::debug!("Event bridge closed; dropping suggestion {}", id);
            }
        });

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::init_app_eventsource;
    use async_trait::async_trait;

    struct StubBackend {
        reply: Result<String, String>,
        delay: Duration,
    }

    impl StubBackend {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for StubBackend {
        async fn complete(&self, system: &str, _prompt: &str) -> Result<String, SuggestionError> {
            assert_eq!(system, SYSTEM_PROMPT);
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map_err(SuggestionError::Api)
        }
    }

    async fn next_suggestion(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<AppEvent>,
    ) -> Suggestion {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(AppEvent::Suggestion(s))) => s,
            other => panic!("expected a suggestion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fenced_reply_is_stripped() {
        let backend = StubBackend::ok("```bash\nfind /var/log -size +100M\n```");
        let result = suggest(&backend, "list files over 100MB in /var/log", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result, "find /var/log -size +100M");
    }

    #[tokio::test]
    async fn test_blank_reply_is_an_error() {
        let backend = StubBackend::ok("```\n\n```");
        let err = suggest(&backend, "anything", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestionError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let backend = StubBackend {
            reply: Ok("ls".to_string()),
            delay: Duration::from_secs(10),
        };
        let err = suggest(&backend, "anything", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestionError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_request_delivers_one_ok_outcome() {
        let (tx, mut rx) = init_app_eventsource();
        let worker = SuggestionWorker::new(
            Arc::new(StubBackend::ok("```\nfind /var/log -size +100M\n```")),
            tx,
            Duration::from_secs(1),
        );

        let id = worker.request("list files over 100MB in /var/log");
        let suggestion = next_suggestion(&mut rx).await;

        assert_eq!(suggestion.id, id);
        assert_eq!(suggestion.outcome, SuggestionOutcome::Ok);
        assert_eq!(suggestion.result, "find /var/log -size +100M");
        assert_eq!(suggestion.prompt, "list files over 100MB in /var/log");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_request_failure_carries_diagnostic() {
        let (tx, mut rx) = init_app_eventsource();
        let worker = SuggestionWorker::new(
            Arc::new(StubBackend::failing("HTTP 500 Internal Server Error")),
            tx,
            Duration::from_secs(1),
        );

        worker.request("list files");
        let suggestion = next_suggestion(&mut rx).await;

        assert_eq!(suggestion.outcome, SuggestionOutcome::Error);
        assert!(!suggestion.result.is_empty());
        assert!(suggestion.result.contains("500"));
    }

    #[tokio::test]
    async fn test_request_ids_increase() {
        let (tx, _rx) = init_app_eventsource();
        let worker = SuggestionWorker::new(Arc::new(StubBackend::ok("ls")), tx, Duration::from_secs(1));
        let first = worker.request("a");
        let second = worker.request("b");
        assert!(second > first);
    }
}
