pub mod openai;

use crate::config::ModelConfig;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use neuroflow_core::{Message, NeuroResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Output shape requested from a non-streaming completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Ask the provider to return a single JSON object.
    Json,
}

/// Text generation capability.
///
/// Every provider speaks the OpenAI chat completions dialect today, but the
/// orchestrator only sees this trait so tests can script responses.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming completion. Returns the assistant text.
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        format: ResponseFormat,
    ) -> NeuroResult<String>;

    /// Streaming completion.
    ///
    /// Returns a receiver for stream events and a join handle resolving to
    /// the full generated text. Dropping the receiver stops the stream.
    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> NeuroResult<(mpsc::Receiver<StreamEvent>, JoinHandle<NeuroResult<String>>)>;
}

/// Build the backend for a model configuration.
pub fn backend_for(config: ModelConfig) -> NeuroResult<Arc<dyn LlmBackend>> {
    Ok(Arc::new(openai::OpenAiBackend::new(config)?))
}
