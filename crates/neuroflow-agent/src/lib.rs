//! Streaming chat orchestration for neuroflow.
//!
//! The [`StreamingOrchestrator`] turns one user message into a lazy stream of
//! visible text: it classifies intent under a short timeout, boosts the
//! knowledge graph, retrieves context, composes the prompt, scans generated
//! tokens for an embedded directive with the [`ToolCallExtractor`], executes
//! a validated [`ToolDirective`] and defers audit work to the [`JobQueue`].

/// LLM provider backends.
pub mod backends;
/// Model, classifier and session settings.
pub mod config;
/// Directive payload schemas and validation.
pub mod directive;
/// Incremental directive scanner over streamed tokens.
pub mod extractor;
/// LLM-backed knowledge candidate extraction.
pub mod harvest;
/// Intent classification.
pub mod intent;
/// Background job queue.
pub mod jobs;
/// Per-request streaming pipeline.
pub mod orchestrator;
/// System prompt composition.
pub mod prompt;
/// Context retrieval.
pub mod retriever;
/// Conversation sessions and their registry.
pub mod session;
/// Streaming event types.
pub mod stream;
/// Directive side effects.
pub mod tools;

pub use backends::{backend_for, LlmBackend, ResponseFormat};
pub use config::{ClassifierConfig, LlmProvider, ModelConfig, SessionConfig};
pub use directive::{directive_schema, ToolDirective, CLOSE_DELIMITER, OPEN_DELIMITER};
pub use extractor::{Extraction, ExtractorState, ToolCallExtractor};
pub use harvest::LlmCandidateExtractor;
pub use intent::{
    Classification, IntentClassifier, LlmIntentClassifier, MAX_FALLBACK_CONFIDENCE,
};
pub use jobs::{Job, JobContext, JobQueue};
pub use orchestrator::{ChatStream, Collaborators, StreamingOrchestrator};
pub use prompt::{allows_directives, PromptComposer};
pub use retriever::{ContextRetriever, KeywordRetriever, KnowledgeItem};
pub use session::{Session, SessionRegistry};
pub use stream::StreamEvent;
pub use tools::{ToolExecutor, ToolOutcome, ToolStatus};
