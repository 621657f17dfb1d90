#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use futures_util::StreamExt;
use neuroflow_agent::{
    Classification, ClassifierConfig, Collaborators, ContextRetriever, IntentClassifier, JobContext,
    JobQueue, KeywordRetriever, KnowledgeItem, LlmBackend, PromptComposer, ResponseFormat,
    SessionRegistry, StreamEvent, StreamingOrchestrator, ToolExecutor, OPEN_DELIMITER,
};
use neuroflow_channels::RealtimeHub;
use neuroflow_core::{Intent, Message, NeuroError, NeuroResult, Role};
use neuroflow_graph::HeatModel;
use neuroflow_store::{InMemoryStorage, Storage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// --- Fakes ---

#[derive(Clone)]
enum Script {
    Tokens(Vec<String>),
    /// Tokens, then a mid-stream error.
    Broken(Vec<String>),
    /// The stream cannot be opened at all.
    Unreachable,
    /// A long stream paced by a small delay per token.
    Endless,
    /// The given tokens, paced like `Endless`.
    Paced(Vec<String>),
}

struct ScriptedBackend {
    script: Script,
    calls: Mutex<Vec<(String, Vec<Message>)>>,
    tokens_sent: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
            tokens_sent: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn tokens(tokens: &[&str]) -> Arc<Self> {
        Self::new(Script::Tokens(tokens.iter().map(|t| t.to_string()).collect()))
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(
        &self,
        _system_prompt: Option<&str>,
        _messages: &[Message],
        _format: ResponseFormat,
    ) -> NeuroResult<String> {
        Ok("{}".into())
    }

    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> NeuroResult<(mpsc::Receiver<StreamEvent>, JoinHandle<NeuroResult<String>>)> {
        self.calls
            .lock()
            .push((system_prompt.unwrap_or_default().to_string(), messages.to_vec()));

        let (tokens, fail, paced) = match &self.script {
            Script::Tokens(t) => (t.clone(), false, false),
            Script::Broken(t) => (t.clone(), true, false),
            Script::Unreachable => {
                return Err(NeuroError::Transport("connection refused".into()));
            }
            Script::Endless => ((0..1000).map(|i| format!("t{i} ")).collect(), false, true),
            Script::Paced(t) => (t.clone(), false, true),
        };

        let (tx, rx) = mpsc::channel(4);
        let sent = self.tokens_sent.clone();
        let handle = tokio::spawn(async move {
            let mut full = String::new();
            for t in tokens {
                if paced {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
                full.push_str(&t);
                if tx.send(StreamEvent::TextDelta { text: t }).await.is_err() {
                    return Ok(full);
                }
                sent.fetch_add(1, Ordering::SeqCst);
            }
            let end = if fail {
                StreamEvent::Error {
                    message: "upstream reset".into(),
                }
            } else {
                StreamEvent::Done
            };
            let _ = tx.send(end).await;
            Ok(full)
        });
        Ok((rx, handle))
    }
}

struct FixedClassifier(Intent);

#[async_trait]
impl IntentClassifier for FixedClassifier {
    async fn classify(&self, _message: &str) -> NeuroResult<Classification> {
        Ok(Classification {
            intent: self.0,
            confidence: 0.93,
            sentiment: Some(0.6),
        })
    }
}

struct SlowClassifier;

#[async_trait]
impl IntentClassifier for SlowClassifier {
    async fn classify(&self, _message: &str) -> NeuroResult<Classification> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Classification {
            intent: Intent::Inversionista,
            confidence: 1.0,
            sentiment: None,
        })
    }
}

struct Harness {
    orchestrator: Arc<StreamingOrchestrator>,
    storage: Arc<InMemoryStorage>,
    hub: Arc<RealtimeHub>,
    heat: Arc<HeatModel>,
}

fn knowledge() -> Arc<dyn ContextRetriever> {
    Arc::new(KeywordRetriever::new(vec![
        KnowledgeItem::new("Identidad", "El CIAY impulsa la innovación.", &["ciay"]),
        KnowledgeItem::new(
            "Inversión",
            "Hay incentivos para quien quiera invertir capital.",
            &["invertir", "capital"],
        ),
    ]))
}

fn harness(
    backend: Arc<ScriptedBackend>,
    classifier: Arc<dyn IntentClassifier>,
    classifier_config: ClassifierConfig,
) -> Harness {
    let storage = Arc::new(InMemoryStorage::new());
    let hub = RealtimeHub::new();
    let heat = Arc::new(HeatModel::default().with_hub(hub.clone()));
    let (jobs, _worker) = JobQueue::start(JobContext {
        storage: storage.clone(),
        heat: heat.clone(),
        hub: hub.clone(),
        harvester: None,
    });
    let orchestrator = StreamingOrchestrator::new(
        Collaborators {
            backend,
            classifier,
            retriever: knowledge(),
            heat: heat.clone(),
            hub: hub.clone(),
            tools: Arc::new(ToolExecutor::new(storage.clone())),
            sessions: Arc::new(SessionRegistry::default()),
            jobs,
        },
        PromptComposer::default(),
    )
    .with_classifier_config(classifier_config);

    Harness {
        orchestrator: Arc::new(orchestrator),
        storage,
        hub,
        heat,
    }
}

fn simple(backend: Arc<ScriptedBackend>, intent: Intent) -> Harness {
    harness(
        backend,
        Arc::new(FixedClassifier(intent)),
        ClassifierConfig::default(),
    )
}

async fn wait_for_records(storage: &InMemoryStorage, n: usize) -> usize {
    for _ in 0..200 {
        let len = storage.interactions(None).await.unwrap().len();
        if len >= n {
            return len;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    storage.interactions(None).await.unwrap().len()
}

const JUAN_DIRECTIVE: &str = r#"CALL: {"action":"save_contact","data":{"nombre":"Juan","correo":"juan@x.com","interes":"inversión"}} @@"#;

// --- Scenarios ---

#[tokio::test]
async fn test_save_contact_directive_is_hidden_and_executed() {
    let backend = ScriptedBackend::tokens(&[
        "Con gusto, Juan. ",
        "Un asesor te contactará.",
        " @@TOOL_",
        JUAN_DIRECTIVE,
    ]);
    let h = simple(backend.clone(), Intent::Inversionista);

    let reply = h.orchestrator.chat("Quiero invertir capital", "sesion-juan").await;
    h.orchestrator.flush_jobs().await;

    assert!(reply.starts_with("Con gusto, Juan. Un asesor te contactará."));
    assert!(!reply.contains("@@"));
    assert!(!reply.contains("save_contact"));
    assert!(reply.ends_with("✅ Contacto guardado en CRM."));

    let leads = h.storage.leads().await.unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].nombre, "Juan");
    assert_eq!(leads[0].correo, "juan@x.com");

    let records = h.storage.interactions(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].detected_intent, "INVERSIONISTA");
    assert!(!records[0].bot_response.contains(OPEN_DELIMITER));
    assert!(records[0]
        .steps
        .iter()
        .any(|s| s.step == "[TOOL_EXEC]" && s.detail == "Contacto guardado en CRM."));

    let (system_prompt, _) = backend.calls.lock()[0].clone();
    assert!(system_prompt.contains(OPEN_DELIMITER));
    assert!(system_prompt.contains("incentivos"));
    assert_eq!(h.heat.weight("Inversión"), Some(25));
}

#[tokio::test]
async fn test_classifier_timeout_falls_back_and_completes() {
    let h = harness(
        ScriptedBackend::tokens(&["Hola, ", "soy el asistente."]),
        Arc::new(SlowClassifier),
        ClassifierConfig {
            timeout_secs: 1,
            ..ClassifierConfig::default()
        },
    );

    let reply = h.orchestrator.chat("hola", "s-timeout").await;
    h.orchestrator.flush_jobs().await;

    assert_eq!(reply, "Hola, soy el asistente.");
    let records = h.storage.interactions(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].detected_intent, "GENERAL");

    let semantic = records[0].steps.iter().find(|s| s.step == "[SEMANTIC]").unwrap();
    let confidence = semantic.data.as_ref().unwrap()["confidence"].as_f64().unwrap();
    assert!(confidence <= 0.5);
    assert_eq!(h.heat.weight("CIAY"), Some(45));
}

#[tokio::test]
async fn test_plain_reply_passes_through_unchanged() {
    let tokens = ["Tenemos cursos ", "de Python; escribe a cursos@ciay.mx ", "para más info."];
    let h = simple(ScriptedBackend::tokens(&tokens), Intent::Estudiante);

    let reply = h.orchestrator.chat("¿Qué cursos hay?", "s-plain").await;
    assert_eq!(reply, tokens.concat());
}

#[tokio::test]
async fn test_invalid_directive_writes_nothing() {
    let backend = ScriptedBackend::tokens(&[
        "Te inscribo. ",
        r#"@@TOOL_CALL: {"action":"register_course","data":{"nombre":"Ana","curso":"IA"}} @@"#,
    ]);
    let h = simple(backend, Intent::Estudiante);

    let reply = h.orchestrator.chat("Inscríbeme a IA", "s-invalid").await;
    h.orchestrator.flush_jobs().await;

    assert_eq!(reply, "Te inscribo. ");
    assert!(h.storage.course_registrations().await.unwrap().is_empty());
    let records = h.storage.interactions(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0]
        .steps
        .iter()
        .any(|s| s.step == "[VALIDATOR]" && s.status == neuroflow_core::StepStatus::Failed));
}

#[tokio::test]
async fn test_unclosed_directive_is_discarded() {
    let backend = ScriptedBackend::tokens(&[
        "Listo. ",
        r#"@@TOOL_CALL: {"action":"create_report","data":{"tipo":"bache""#,
    ]);
    let h = simple(backend, Intent::Ciudadano);

    let reply = h.orchestrator.chat("Hay un bache", "s-unclosed").await;
    h.orchestrator.flush_jobs().await;

    assert_eq!(reply, "Listo. ");
    assert!(h.storage.reports().await.unwrap().is_empty());
    assert_eq!(h.storage.interactions(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_model_yields_one_error_fragment() {
    let h = simple(ScriptedBackend::new(Script::Unreachable), Intent::General);

    let fragments: Vec<String> = h.orchestrator.stream_chat("hola", "s-down").collect().await;
    h.orchestrator.flush_jobs().await;

    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].contains("Lo siento"));
    let records = h.storage.interactions(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0]
        .steps
        .iter()
        .any(|s| s.step == "[LLM]" && s.status == neuroflow_core::StepStatus::Failed));
}

#[tokio::test]
async fn test_mid_stream_error_keeps_partial_text() {
    let backend = ScriptedBackend::new(Script::Broken(vec!["Parte uno, ".into(), "parte dos".into()]));
    let h = simple(backend, Intent::General);

    let reply = h.orchestrator.chat("hola", "s-broken").await;
    h.orchestrator.flush_jobs().await;

    assert!(reply.starts_with("Parte uno, parte dos"));
    assert!(reply.contains("Lo siento"));
    let records = h.storage.interactions(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].bot_response.starts_with("Parte uno, parte dos"));
}

#[tokio::test]
async fn test_client_disconnect_stops_generation_but_records() {
    let backend = ScriptedBackend::new(Script::Endless);
    let h = simple(backend.clone(), Intent::General);

    let mut stream = h.orchestrator.stream_chat("cuéntame todo", "s-gone");
    let first = stream.next().await.unwrap();
    assert!(first.starts_with("t0"));
    drop(stream);

    assert_eq!(wait_for_records(&h.storage, 1).await, 1);
    assert!(backend.tokens_sent.load(Ordering::SeqCst) < 1000);

    let record = &h.storage.interactions(None).await.unwrap()[0];
    assert!(record.bot_response.starts_with("t0"));
    assert!(record
        .steps
        .iter()
        .any(|s| s.detail.contains("Cliente desconectado")));
}

#[tokio::test]
async fn test_disconnect_while_directive_is_hidden_skips_execution() {
    let mut tokens = vec![
        "Hola ".to_string(),
        "@@TOOL_".to_string(),
        JUAN_DIRECTIVE.to_string(),
    ];
    tokens.extend((0..500).map(|i| format!("relleno {i} ")));
    let total = tokens.len();
    let backend = ScriptedBackend::new(Script::Paced(tokens));
    let h = simple(backend.clone(), Intent::Inversionista);

    let mut stream = h.orchestrator.stream_chat("Quiero invertir", "s-hidden");
    assert_eq!(stream.next().await.unwrap(), "Hola ");
    drop(stream);

    assert_eq!(wait_for_records(&h.storage, 1).await, 1);
    h.orchestrator.flush_jobs().await;
    assert!(backend.tokens_sent.load(Ordering::SeqCst) < total);
    assert!(h.storage.leads().await.unwrap().is_empty());

    let record = &h.storage.interactions(None).await.unwrap()[0];
    assert_eq!(record.bot_response, "Hola ");
    assert!(record
        .steps
        .iter()
        .any(|s| s.step == "[KERNEL]" && s.detail.contains("Cliente desconectado")));
    assert!(!record.steps.iter().any(|s| s.step == "[TOOL_EXEC]"));
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let backend = ScriptedBackend::tokens(&["hola"]);
    let h = simple(backend.clone(), Intent::General);

    let stream = h.orchestrator.stream_chat("hola", "s-lazy");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(backend.calls.lock().is_empty());

    let fragments: Vec<String> = stream.collect().await;
    assert_eq!(fragments.concat(), "hola");
    assert_eq!(backend.calls.lock().len(), 1);
}

#[tokio::test]
async fn test_same_session_requests_are_serialized() {
    let backend = ScriptedBackend::tokens(&["respuesta"]);
    let h = simple(backend.clone(), Intent::General);

    let (a, b) = tokio::join!(
        h.orchestrator.chat("primera", "s-shared"),
        h.orchestrator.chat("segunda", "s-shared"),
    );
    assert_eq!(a, "respuesta");
    assert_eq!(b, "respuesta");

    let mut history_lengths: Vec<usize> =
        backend.calls.lock().iter().map(|(_, m)| m.len()).collect();
    history_lengths.sort_unstable();
    assert_eq!(history_lengths, vec![1, 3]);

    let calls = backend.calls.lock();
    let longer = calls.iter().find(|(_, m)| m.len() == 3).unwrap();
    assert_eq!(longer.1[0].role, Role::User);
    assert_eq!(longer.1[1].role, Role::Assistant);
    assert_eq!(longer.1[1].content, "respuesta");
}

#[tokio::test]
async fn test_step_events_are_unicast_graph_events_broadcast() {
    let h = simple(ScriptedBackend::tokens(&["ok"]), Intent::Gobierno);
    let mut mine = h.hub.subscribe("s-a").await;
    let mut other = h.hub.subscribe("s-b").await;

    h.orchestrator.chat("trámites", "s-a").await;
    h.orchestrator.flush_jobs().await;

    let drain = |rx: &mut mpsc::UnboundedReceiver<String>| {
        let mut types = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(v["session_id"], "s-a");
            types.push(v["type"].as_str().unwrap().to_string());
        }
        types
    };

    let mine_types = drain(&mut mine.receiver);
    let other_types = drain(&mut other.receiver);

    assert!(mine_types.iter().any(|t| t == "log"));
    assert!(mine_types.iter().any(|t| t == "graph_heat"));
    assert!(!other_types.iter().any(|t| t == "log"));
    assert!(other_types.iter().any(|t| t == "graph_heat"));
    assert!(other_types.iter().any(|t| t == "graph_data"));
}

#[tokio::test]
async fn test_schema_not_injected_for_general_intent() {
    let backend = ScriptedBackend::tokens(&["hola"]);
    let h = simple(backend.clone(), Intent::General);

    h.orchestrator.chat("hola", "s-general").await;

    let (system_prompt, history) = backend.calls.lock()[0].clone();
    assert!(!system_prompt.contains(OPEN_DELIMITER));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "hola");
}

#[tokio::test]
async fn test_sentiment_is_recorded() {
    let h = simple(ScriptedBackend::tokens(&["¡Genial!"]), Intent::Startup);

    h.orchestrator.chat("Me encanta su programa", "s-sent").await;
    h.orchestrator.flush_jobs().await;

    let record = &h.storage.interactions(None).await.unwrap()[0];
    assert!((record.sentiment_score - 0.6).abs() < 1e-6);
    assert_eq!(record.sentiment_label.as_str(), "POSITIVO");
}
