use super::{LlmBackend, ResponseFormat};
use crate::config::{LlmProvider, ModelConfig};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use futures_util::StreamExt;
use neuroflow_core::{Message, NeuroError, NeuroResult};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// OpenAI-compatible chat completions backend.
///
/// Works with DeepSeek, OpenAI, OpenRouter, Groq and any other provider that
/// implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> NeuroResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NeuroError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url())
    }

    fn build_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> Vec<serde_json::Value> {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);

        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for m in messages {
            api_messages.push(serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content
            }));
        }

        api_messages
    }

    fn build_body(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        stream: bool,
    ) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(system_prompt, messages),
            "stream": stream,
        })
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "Neuroflow")
        } else {
            request
        }
    }

    async fn post(&self, body: &serde_json::Value) -> NeuroResult<reqwest::Response> {
        self.add_provider_headers(self.http.post(self.endpoint()))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    NeuroError::Transport(e.to_string())
                } else {
                    NeuroError::Http(e.to_string())
                }
            })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        format: ResponseFormat,
    ) -> NeuroResult<String> {
        let mut body = self.build_body(system_prompt, messages, false);
        if format == ResponseFormat::Json {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let resp = self.post(&body).await?;
        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| NeuroError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(NeuroError::Http(format!(
                "Chat completions error {status}: {resp_body}"
            )));
        }

        parse_completion(&resp_body)
    }

    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> NeuroResult<(mpsc::Receiver<StreamEvent>, JoinHandle<NeuroResult<String>>)> {
        let body = self.build_body(system_prompt, messages, true);
        let resp = self.post(&body).await?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(NeuroError::Http(format!(
                "Chat completions error {status}: {error_body}"
            )));
        }

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let mut byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            // Raw bytes: a multi-byte character may straddle two chunks.
            let mut buffer: Vec<u8> = Vec::new();
            let mut full_text = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let message = format!("Stream read error: {e}");
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: message.clone(),
                            })
                            .await;
                        return Err(NeuroError::Stream(message));
                    }
                };

                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim();

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        let _ = tx.send(StreamEvent::Done).await;
                        return Ok(full_text);
                    }

                    let event: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    if let Some(content) = event["choices"][0]["delta"]["content"].as_str() {
                        if !content.is_empty() {
                            full_text.push_str(content);
                            let delta = StreamEvent::TextDelta {
                                text: content.to_string(),
                            };
                            if tx.send(delta).await.is_err() {
                                debug!("Stream consumer gone, abandoning generation");
                                return Ok(full_text);
                            }
                        }
                    }
                }
            }

            let _ = tx.send(StreamEvent::Done).await;
            Ok(full_text)
        });

        Ok((rx, handle))
    }
}

/// Extract the assistant text from a non-streaming response body.
pub fn parse_completion(body: &serde_json::Value) -> NeuroResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| NeuroError::Http(format!("Completion without content: {body}")))
}
