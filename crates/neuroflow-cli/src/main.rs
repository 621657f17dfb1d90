mod config;

use crate::config::{NeuroflowConfig, API_KEY_ENV};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use neuroflow_agent::{
    backend_for, Collaborators, JobContext, JobQueue, KeywordRetriever, LlmCandidateExtractor,
    LlmIntentClassifier, PromptComposer, SessionRegistry, StreamingOrchestrator, ToolExecutor,
};
use neuroflow_channels::RealtimeHub;
use neuroflow_gateway::GatewayServer;
use neuroflow_graph::{HeatModel, KnowledgeHarvester};
use neuroflow_store::{SqliteStorage, Storage};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "neuroflow", about = "Neuroflow: streaming conversational backend")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "neuroflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat from the terminal
    Chat {
        /// Send a single message and exit
        #[arg(short, long)]
        message: Option<String>,
        /// Session id (a fresh one by default)
        #[arg(short, long)]
        session: Option<String>,
    },
}

/// Wire every component from the config.
async fn build_orchestrator(config: &NeuroflowConfig) -> anyhow::Result<Arc<StreamingOrchestrator>> {
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(config.database_path())?);
    info!(path = %config.database_path().display(), "Storage opened");

    let hub = RealtimeHub::new();
    let heat = Arc::new(HeatModel::new(config.graph.heat.clone()).with_hub(hub.clone()));
    let loaded = heat.sync_with(storage.as_ref()).await?;
    info!(
        loaded,
        nodes = heat.node_count(),
        edges = heat.edge_count(),
        "Knowledge graph ready"
    );

    let backend = backend_for(config.model.clone())?;
    if config.model.api_key.is_empty() {
        warn!("No API key configured; set [model] api_key or {API_KEY_ENV}");
    }

    let retriever = match &config.knowledge_path {
        Some(path) => {
            let retriever = KeywordRetriever::from_json_file(path)?;
            info!(items = retriever.len(), path = %path.display(), "Knowledge base loaded");
            retriever
        }
        None => {
            warn!("No knowledge_path configured; replies use generic context");
            KeywordRetriever::default()
        }
    };

    let composer = match &config.persona_path {
        Some(path) => PromptComposer::from_file(path)?,
        None => PromptComposer::default(),
    };

    let harvester = config.graph.harvest.then(|| {
        Arc::new(
            KnowledgeHarvester::new(
                storage.clone(),
                heat.clone(),
                Arc::new(LlmCandidateExtractor::new(backend.clone())),
            )
            .with_max_node_id_len(config.graph.max_node_id_len),
        )
    });

    let (jobs, _worker) = JobQueue::start(JobContext {
        storage: storage.clone(),
        heat: heat.clone(),
        hub: hub.clone(),
        harvester,
    });

    let orchestrator = StreamingOrchestrator::new(
        Collaborators {
            backend: backend.clone(),
            classifier: Arc::new(LlmIntentClassifier::new(backend)),
            retriever: Arc::new(retriever),
            heat,
            hub,
            tools: Arc::new(ToolExecutor::new(storage)),
            sessions: Arc::new(SessionRegistry::new(config.sessions.clone())),
            jobs,
        },
        composer,
    )
    .with_classifier_config(config.classifier.clone())
    .with_harvesting(config.graph.harvest);

    Ok(Arc::new(orchestrator))
}

async fn chat_once(
    orchestrator: &Arc<StreamingOrchestrator>,
    message: &str,
    session_id: &str,
) -> anyhow::Result<()> {
    let mut stream = orchestrator.stream_chat(message, session_id);
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();
    let config = NeuroflowConfig::load(&cli.config)
        .await?
        .with_api_key_fallback(std::env::var(API_KEY_ENV).ok())
        .resolve_paths(&config_dir);

    let orchestrator = build_orchestrator(&config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            let app = GatewayServer::build(orchestrator.clone());
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            info!("Neuroflow gateway listening on {addr}");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Shutdown requested");
                })
                .await?;

            orchestrator.flush_jobs().await;
        }
        Commands::Chat { message, session } => {
            let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            if let Some(message) = message {
                chat_once(&orchestrator, &message, &session_id).await?;
            } else {
                println!("Sesión {session_id}. Escribe tu mensaje (Ctrl-D para salir).");
                let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
                loop {
                    print!("> ");
                    std::io::stdout().flush()?;
                    let Some(line) = lines.next_line().await? else {
                        break;
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    chat_once(&orchestrator, line, &session_id).await?;
                }
            }

            orchestrator.flush_jobs().await;
        }
    }

    Ok(())
}
