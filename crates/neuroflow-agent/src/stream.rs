use serde::{Deserialize, Serialize};

/// Events emitted during a streaming LLM response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of generated text.
    TextDelta { text: String },

    /// The stream has finished successfully.
    Done,

    /// The stream failed; no further events follow.
    Error { message: String },
}
