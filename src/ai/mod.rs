//! AI module for natural-language to shell-command suggestions.
//!
//! - `prompt`: the fixed system instruction and reply clean-up
//! - `backend`: the completion API seam and its OpenAI implementation
//! - `worker`: spawns one request per prompt and reports the outcome

pub mod backend;
pub mod prompt;
pub mod worker;

pub use backend::{CompletionBackend, OpenAiBackend};
pub use worker::{RequestId, Suggestion, SuggestionOutcome, SuggestionWorker, suggest};
