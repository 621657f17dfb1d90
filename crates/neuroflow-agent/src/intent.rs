use crate::backends::{LlmBackend, ResponseFormat};
use async_trait::async_trait;
use neuroflow_core::{Intent, Message, NeuroError, NeuroResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CLASSIFIER_PROMPT: &str = "Eres el Clasificador Semántico. \
Categorías: INVERSIONISTA, ESTUDIANTE, GOBIERNO, STARTUP, GENERAL, CONTACTO, CIUDADANO. \
Responde solo JSON: {\"intent\": \"CATEGORIA\", \"confidence\": 0.95, \"sentiment\": 0.0} \
donde sentiment va de -1 (muy negativo) a 1 (muy positivo).";

/// Upper bound on the confidence of a degraded classification.
pub const MAX_FALLBACK_CONFIDENCE: f32 = 0.5;

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    /// In `[0, 1]`.
    pub confidence: f32,
    /// In `[-1, 1]` when the classifier reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f32>,
}

impl Classification {
    /// Degraded result used when the classifier is unavailable.
    ///
    /// Confidence never exceeds [`MAX_FALLBACK_CONFIDENCE`].
    pub fn fallback(intent: Intent, confidence: f32) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, MAX_FALLBACK_CONFIDENCE),
            sentiment: None,
        }
    }
}

/// Text → intent capability.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify a user message.
    async fn classify(&self, message: &str) -> NeuroResult<Classification>;
}

#[derive(Deserialize)]
struct RawClassification {
    #[serde(default)]
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    sentiment: Option<f32>,
}

/// Parse a classifier reply. Unknown labels become [`Intent::General`].
pub fn parse_classification(text: &str) -> NeuroResult<Classification> {
    let raw: RawClassification = serde_json::from_str(text.trim())?;
    if raw.intent.trim().is_empty() {
        return Err(NeuroError::Validation("classifier reply without intent".into()));
    }
    Ok(Classification {
        intent: Intent::parse(&raw.intent),
        confidence: raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        sentiment: raw.sentiment.map(|s| s.clamp(-1.0, 1.0)),
    })
}

/// Classifier backed by a JSON-mode completion.
pub struct LlmIntentClassifier {
    backend: Arc<dyn LlmBackend>,
}

impl LlmIntentClassifier {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, message: &str) -> NeuroResult<Classification> {
        let reply = self
            .backend
            .complete(
                Some(CLASSIFIER_PROMPT),
                &[Message::user(message)],
                ResponseFormat::Json,
            )
            .await?;
        parse_classification(&reply)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reply() {
        let c = parse_classification(
            r#"{"intent":"INVERSIONISTA","confidence":0.92,"sentiment":0.4}"#,
        )
        .unwrap();
        assert_eq!(c.intent, Intent::Inversionista);
        assert!((c.confidence - 0.92).abs() < 1e-6);
        assert_eq!(c.sentiment, Some(0.4));
    }

    #[test]
    fn test_parse_clamps_and_defaults() {
        let c = parse_classification(r#"{"intent":"marciano","confidence":7,"sentiment":-3}"#)
            .unwrap();
        assert_eq!(c.intent, Intent::General);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.sentiment, Some(-1.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_classification("no es json").is_err());
        assert!(parse_classification(r#"{"confidence":0.9}"#).is_err());
    }

    #[test]
    fn test_fallback_has_no_sentiment() {
        let c = Classification::fallback(Intent::General, 0.5);
        assert_eq!(c.intent, Intent::General);
        assert!(c.confidence <= 0.5);
        assert!(c.sentiment.is_none());
    }

    #[test]
    fn test_fallback_confidence_capped_at_half() {
        let c = Classification::fallback(Intent::Contacto, 0.9);
        assert_eq!(c.confidence, MAX_FALLBACK_CONFIDENCE);

        let c = Classification::fallback(Intent::General, 0.2);
        assert!((c.confidence - 0.2).abs() < 1e-6);

        let c = Classification::fallback(Intent::General, -1.0);
        assert_eq!(c.confidence, 0.0);
    }
}
