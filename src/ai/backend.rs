//! Completion backends.
//!
//! The suggestion worker talks to a [`CompletionBackend`]; production uses the
//! OpenAI chat completions API through `async-openai`.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use tracing::debug;

use crate::config::AiConfig;
use crate::error::SuggestionError;

/// One non-streaming chat completion: a system instruction and a user prompt in,
/// the raw completion text out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, SuggestionError>;
}

pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiBackend {
    /// Build a client from configuration. The API key is read from the
    /// environment variable the config names.
    pub fn new(config: &AiConfig) -> Self {
        let mut openai = OpenAIConfig::new();
        match std::env::var(&config.api_key_env) {
            Ok(key) => openai = openai.with_api_key(key),
            Err(_) => tracing::warn!(
                "{} is not set; completion requests will be rejected",
                config.api_key_env
            ),
        }
        if let Some(base) = &config.api_base {
            openai = openai.with_api_base(base);
        }

        // One network call per request; 429 and 5xx replies are not retried.
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai).with_backoff(no_retry),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, SuggestionError> {
        let build_err = |e: async_openai::error::OpenAIError| SuggestionError::Build(e.to_string());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(build_err)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(build_err)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(vec![system_msg.into(), user_msg.into()])
            .build()
            .map_err(build_err)?;

        debug!("Requesting completion from {}", self.model);
        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(SuggestionError::EmptyResponse)
    }
}
