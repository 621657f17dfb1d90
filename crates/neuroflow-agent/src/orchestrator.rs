use crate::backends::LlmBackend;
use crate::config::ClassifierConfig;
use crate::directive::ToolDirective;
use crate::extractor::{Extraction, ToolCallExtractor};
use crate::intent::{Classification, IntentClassifier};
use crate::jobs::{Job, JobQueue};
use crate::prompt::{allows_directives, PromptComposer};
use crate::retriever::ContextRetriever;
use crate::session::SessionRegistry;
use crate::stream::StreamEvent;
use crate::tools::ToolExecutor;
use futures_util::{Stream, StreamExt};
use neuroflow_channels::RealtimeHub;
use neuroflow_core::{InteractionRecord, Message, StepEvent, StepStatus};
use neuroflow_graph::HeatModel;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Lazy, finite sequence of visible text fragments.
pub type ChatStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Snippets requested from the retriever per request.
pub const RETRIEVAL_LIMIT: usize = 3;

/// Fragment yielded when generation fails.
pub const STREAM_ERROR_FRAGMENT: &str =
    "\n\n⚠️ Lo siento, ocurrió un problema al generar la respuesta. Intenta de nuevo.";

/// Capabilities the orchestrator composes.
pub struct Collaborators {
    /// Text generation.
    pub backend: Arc<dyn LlmBackend>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub retriever: Arc<dyn ContextRetriever>,
    /// Shared across sessions.
    pub heat: Arc<HeatModel>,
    pub hub: Arc<RealtimeHub>,
    pub tools: Arc<ToolExecutor>,
    pub sessions: Arc<SessionRegistry>,
    /// Audit, topology and harvest work.
    pub jobs: JobQueue,
}

/// Top-level coordinator of one chat request.
///
/// Classifies, boosts the graph, retrieves context, streams generation
/// through the directive extractor, executes a validated directive and
/// hands audit and topology work to the job queue. The visible stream is the
/// only error channel towards the client; operational detail goes out as
/// step events on the realtime hub.
pub struct StreamingOrchestrator {
    deps: Collaborators,
    composer: PromptComposer,
    classifier_config: ClassifierConfig,
    harvest: bool,
}

/// Visible output of one request.
struct Output {
    tx: mpsc::Sender<String>,
    text: String,
    connected: bool,
}

impl Output {
    /// Forward a fragment. Returns false once the client is gone.
    ///
    /// Checked on every call, including empty fragments, so a disconnect is
    /// noticed while the extractor is suppressing output. `text` only holds
    /// what was actually delivered.
    async fn send(&mut self, fragment: String) -> bool {
        if self.connected && self.tx.is_closed() {
            self.disconnect();
        }
        if fragment.is_empty() || !self.connected {
            return self.connected;
        }
        let delivered = self.text.len();
        self.text.push_str(&fragment);
        if self.tx.send(fragment).await.is_err() {
            self.text.truncate(delivered);
            self.disconnect();
        }
        self.connected
    }

    fn disconnect(&mut self) {
        debug!("Client disconnected");
        self.connected = false;
    }
}

/// Ordered step events of one request, mirrored to the realtime hub.
struct Trace {
    hub: Arc<RealtimeHub>,
    session_id: String,
    steps: Vec<StepEvent>,
}

impl Trace {
    async fn record(&mut self, event: StepEvent) {
        self.hub.log_step(&self.session_id, &event).await;
        self.steps.push(event);
    }

    async fn step(&mut self, step: &str, detail: impl Into<String>, status: StepStatus) {
        self.record(StepEvent::new(step, detail, status)).await;
    }
}

impl StreamingOrchestrator {
    pub fn new(deps: Collaborators, composer: PromptComposer) -> Self {
        Self {
            deps,
            composer,
            classifier_config: ClassifierConfig::default(),
            harvest: false,
        }
    }

    pub fn with_classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.classifier_config = config;
        self
    }

    /// Queue a knowledge harvest after every successful exchange.
    pub fn with_harvesting(mut self, enabled: bool) -> Self {
        self.harvest = enabled;
        self
    }

    pub fn heat(&self) -> &Arc<HeatModel> {
        &self.deps.heat
    }

    pub fn hub(&self) -> &Arc<RealtimeHub> {
        &self.deps.hub
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.deps.sessions
    }

    /// Wait for every background job submitted so far.
    pub async fn flush_jobs(&self) {
        self.deps.jobs.flush().await;
    }

    /// Stream the reply to `message`.
    ///
    /// Nothing happens until the stream is first polled. Dropping the stream
    /// stops generation promptly; the interaction is still recorded.
    pub fn stream_chat(
        self: &Arc<Self>,
        message: impl Into<String>,
        session_id: impl Into<String>,
    ) -> ChatStream {
        let this = Arc::clone(self);
        let message = message.into();
        let session_id = session_id.into();

        let start = async move {
            let (tx, rx) = mpsc::channel::<String>(64);
            tokio::spawn(async move { this.process(message, session_id, tx).await });
            ReceiverStream::new(rx)
        };
        Box::pin(futures_util::stream::once(start).flatten())
    }

    /// Collect the whole visible reply.
    pub async fn chat(
        self: &Arc<Self>,
        message: impl Into<String>,
        session_id: impl Into<String>,
    ) -> String {
        self.stream_chat(message, session_id)
            .collect::<Vec<_>>()
            .await
            .concat()
    }

    async fn classify(&self, message: &str) -> (Classification, bool) {
        let timeout = Duration::from_secs(self.classifier_config.timeout_secs);
        let fallback = || {
            Classification::fallback(
                self.classifier_config.fallback_intent,
                self.classifier_config.fallback_confidence,
            )
        };
        match tokio::time::timeout(timeout, self.deps.classifier.classify(message)).await {
            Ok(Ok(c)) => (c, false),
            Ok(Err(e)) => {
                warn!(error = %e, "Intent classification failed, using fallback");
                (fallback(), true)
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Intent classification timed out, using fallback");
                (fallback(), true)
            }
        }
    }

    async fn process(&self, message: String, session_id: String, tx: mpsc::Sender<String>) {
        // Held for the whole request: same-session requests run one at a time.
        let handle = self.deps.sessions.acquire(&session_id);
        let mut session = handle.lock_owned().await;

        let mut trace = Trace {
            hub: self.deps.hub.clone(),
            session_id: session_id.clone(),
            steps: Vec::new(),
        };
        let mut out = Output {
            tx,
            text: String::new(),
            connected: true,
        };

        let short_id: String = session_id.chars().take(6).collect();
        trace
            .step("[KERNEL]", format!("Sesión activa: {short_id}"), StepStatus::Success)
            .await;

        let (classification, degraded) = self.classify(&message).await;
        let intent = classification.intent;
        trace
            .record(
                StepEvent::new(
                    "[SEMANTIC]",
                    format!("Intención: {intent}"),
                    if degraded {
                        StepStatus::Failed
                    } else {
                        StepStatus::Success
                    },
                )
                .with_data(serde_json::to_value(&classification).unwrap_or_default()),
            )
            .await;

        let delta = self.deps.heat.boost(&session_id, intent).await;
        trace
            .record(
                StepEvent::new(
                    "[GRAPH]",
                    format!("Nodo {} → {}", delta.node_id, delta.new_weight),
                    StepStatus::Success,
                )
                .with_data(serde_json::to_value(&delta).unwrap_or_default()),
            )
            .await;

        let context = match self
            .deps
            .retriever
            .retrieve(&message, RETRIEVAL_LIMIT)
            .await
        {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!(error = %e, "Context retrieval failed");
                Vec::new()
            }
        };
        if context.is_empty() {
            trace
                .step("[RAG]", "Sin coincidencias; contexto genérico", StepStatus::Done)
                .await;
        } else {
            trace
                .step(
                    "[RAG]",
                    format!("{} fragmentos recuperados", context.len()),
                    StepStatus::Success,
                )
                .await;
        }

        let system_prompt = self.composer.compose(intent, &context);
        let mut history = session.messages().to_vec();
        history.push(Message::user(message.as_str()));

        trace
            .record(
                StepEvent::new("[LLM]", "Inferencia estructurada...", StepStatus::Running)
                    .with_data(serde_json::json!({ "schema_enforced": allows_directives(intent) })),
            )
            .await;

        let mut extractor = ToolCallExtractor::new();
        let mut stream_error: Option<String> = None;

        match self
            .deps
            .backend
            .chat_stream(Some(&system_prompt), &history)
            .await
        {
            Ok((mut rx, _generation)) => {
                while let Some(event) = rx.recv().await {
                    match event {
                        StreamEvent::TextDelta { text } => {
                            if !out.send(extractor.push(&text)).await {
                                break;
                            }
                        }
                        StreamEvent::Done => break,
                        StreamEvent::Error { message } => {
                            stream_error = Some(message);
                            break;
                        }
                    }
                }
                // Dropping the receiver makes the generation task stop.
            }
            Err(e) => stream_error = Some(e.to_string()),
        }

        let (tail, extraction) = extractor.finish();
        out.send(tail).await;
        let reply = out.text.clone();

        if let Some(err) = &stream_error {
            warn!(session_id = %session_id, error = %err, "Generation failed");
            trace
                .step("[LLM]", format!("Error de generación: {err}"), StepStatus::Failed)
                .await;
            out.send(STREAM_ERROR_FRAGMENT.to_string()).await;
        } else if !out.connected {
            trace
                .step("[KERNEL]", "Cliente desconectado; generación detenida", StepStatus::Failed)
                .await;
        } else {
            trace
                .step("[LLM]", "Generación completa", StepStatus::Success)
                .await;
            self.finalize_directive(extraction, &mut trace, &mut out).await;
        }

        session.add_message(Message::user(message.as_str()));
        if !reply.is_empty() {
            session.add_message(Message::assistant(reply.as_str()));
        }
        drop(session);

        let record = InteractionRecord::new(
            session_id.as_str(),
            message.as_str(),
            out.text.as_str(),
            intent.as_str(),
            trace.steps,
            classification.sentiment.unwrap_or(0.0),
        );
        info!(
            session_id = %session_id,
            intent = %intent,
            chars = record.bot_response.chars().count(),
            "Chat request completed"
        );

        self.deps.jobs.submit(Job::PersistInteraction(Box::new(record)));
        self.deps.jobs.submit(Job::PublishTopology {
            session_id: session_id.clone(),
        });
        if self.harvest && stream_error.is_none() && !reply.is_empty() {
            self.deps.jobs.submit(Job::Harvest {
                user_input: message,
                bot_response: reply,
            });
        }
    }

    async fn finalize_directive(&self, extraction: Extraction, trace: &mut Trace, out: &mut Output) {
        let payload = match extraction {
            Extraction::None => return,
            Extraction::Malformed(raw) => {
                warn!("Directive opened but never closed, discarding");
                trace
                    .record(
                        StepEvent::new(
                            "[VALIDATOR]",
                            "Bloque de herramienta sin cierre; descartado",
                            StepStatus::Failed,
                        )
                        .with_data(serde_json::json!({ "raw": raw })),
                    )
                    .await;
                return;
            }
            Extraction::Payload(payload) => payload,
        };

        trace
            .step("[VALIDATOR]", "Validando estructura JSON...", StepStatus::Running)
            .await;

        let directive = match ToolDirective::parse(&payload) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Directive rejected");
                trace
                    .record(
                        StepEvent::new("[VALIDATOR]", format!("Error de esquema: {e}"), StepStatus::Failed)
                            .with_data(serde_json::json!({ "raw": payload })),
                    )
                    .await;
                return;
            }
        };

        trace
            .record(
                StepEvent::new("[VALIDATOR]", "Esquema válido. Ejecutando...", StepStatus::Success)
                    .with_data(serde_json::to_value(&directive).unwrap_or_default()),
            )
            .await;

        let outcome = self.deps.tools.execute(&directive).await;
        let status = if outcome.is_success() {
            StepStatus::Success
        } else {
            StepStatus::Failed
        };
        trace
            .record(
                StepEvent::new("[TOOL_EXEC]", outcome.message.as_str(), status)
                    .with_data(serde_json::to_value(&outcome).unwrap_or_default()),
            )
            .await;

        if outcome.is_success() {
            out.send(format!("\n\n✅ {}", outcome.message)).await;
        }
    }
}
