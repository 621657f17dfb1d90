use neuroflow_core::Intent;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    DeepSeek,
    OpenAi,
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible.
    Groq,
}

/// Generation model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    pub api_base_url: Option<String>,
    /// Low values keep directive payloads well-formed.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Whole-request timeout for generation calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> LlmProvider {
    LlmProvider::DeepSeek
}

fn default_model_id() -> String {
    "deepseek-chat".into()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    45
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ModelConfig {
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::DeepSeek => "https://api.deepseek.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
            }
        }
    }
}

/// Intent classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Hard timeout, independent of the generation timeout.
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_fallback_intent")]
    pub fallback_intent: Intent,
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f32,
}

fn default_classifier_timeout() -> u64 {
    5
}

fn default_fallback_intent() -> Intent {
    Intent::General
}

fn default_fallback_confidence() -> f32 {
    0.5
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_classifier_timeout(),
            fallback_intent: default_fallback_intent(),
            fallback_confidence: default_fallback_confidence(),
        }
    }
}

/// Session registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// History window per session.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_messages() -> usize {
    20
}

fn default_idle_ttl_secs() -> u64 {
    3600
}

fn default_max_sessions() -> usize {
    10_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            idle_ttl_secs: default_idle_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_defaults_from_empty_table() {
        let cfg: ModelConfig = toml_like("{}");
        assert_eq!(cfg.provider, LlmProvider::DeepSeek);
        assert_eq!(cfg.model_id, "deepseek-chat");
        assert!((cfg.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.timeout_secs, 45);
        assert_eq!(cfg.base_url(), "https://api.deepseek.com");
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let cfg: ModelConfig =
            toml_like(r#"{"provider":"groq","api_base_url":"http://localhost:9000/"}"#);
        assert_eq!(cfg.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_classifier_defaults() {
        let cfg: ClassifierConfig = toml_like("{}");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.fallback_intent, Intent::General);
        assert!(cfg.fallback_confidence <= 0.5);
    }

    fn toml_like<T: serde::de::DeserializeOwned>(json: &str) -> T {
        serde_json::from_str(json).unwrap()
    }
}
