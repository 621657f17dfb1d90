use crate::event::StepEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse sentiment bucket stored alongside each interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    /// Score above the positive threshold.
    Positivo,
    /// Score within the neutral band.
    Neutro,
    /// Score below the negative threshold.
    Negativo,
}

impl SentimentLabel {
    const THRESHOLD: f32 = 0.25;

    /// Buckets a score in `[-1, 1]`.
    pub fn from_score(score: f32) -> Self {
        if score > Self::THRESHOLD {
            SentimentLabel::Positivo
        } else if score < -Self::THRESHOLD {
            SentimentLabel::Negativo
        } else {
            SentimentLabel::Neutro
        }
    }

    /// Stored label string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positivo => "POSITIVO",
            SentimentLabel::Neutro => "NEUTRO",
            SentimentLabel::Negativo => "NEGATIVO",
        }
    }
}

/// Append-only audit record of one completed streaming request.
///
/// Exactly one is written per request, including requests that ended in a
/// model error or a client disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Record id.
    pub id: Uuid,
    /// Session the request belonged to.
    pub session_id: String,
    /// The raw user message.
    pub user_input: String,
    /// Visible reply text with directive markup stripped.
    pub bot_response: String,
    /// Intent label used for this request.
    pub detected_intent: String,
    /// Ordered step trace.
    pub steps: Vec<StepEvent>,
    /// Sentiment score in `[-1, 1]`.
    pub sentiment_score: f32,
    /// Bucketed sentiment.
    pub sentiment_label: SentimentLabel,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// Builds a record, clamping the sentiment score and deriving its label.
    pub fn new(
        session_id: impl Into<String>,
        user_input: impl Into<String>,
        bot_response: impl Into<String>,
        detected_intent: impl Into<String>,
        steps: Vec<StepEvent>,
        sentiment_score: f32,
    ) -> Self {
        let score = sentiment_score.clamp(-1.0, 1.0);
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            user_input: user_input.into(),
            bot_response: bot_response.into(),
            detected_intent: detected_intent.into(),
            steps,
            sentiment_score: score,
            sentiment_label: SentimentLabel::from_score(score),
            created_at: Utc::now(),
        }
    }
}
