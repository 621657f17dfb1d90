use neuroflow_channels::RealtimeHub;
use neuroflow_core::InteractionRecord;
use neuroflow_graph::{HeatModel, KnowledgeHarvester};
use neuroflow_store::Storage;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Work deferred off the request path.
#[derive(Debug)]
pub enum Job {
    /// Append the audit record of a finished request.
    PersistInteraction(Box<InteractionRecord>),
    /// Broadcast the current graph topology to every observer.
    PublishTopology { session_id: String },
    /// Grow the knowledge graph from a finished exchange.
    Harvest {
        user_input: String,
        bot_response: String,
    },
    /// Completes once every job submitted before it has run.
    Barrier(oneshot::Sender<()>),
}

/// Background jobs that never block the visible stream.
///
/// One worker task drains an unbounded queue in submission order. Each job
/// handles its own failure; nothing is retried and nothing is reported back
/// to the submitter.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

/// What the worker needs to run jobs.
pub struct JobContext {
    pub storage: Arc<dyn Storage>,
    pub heat: Arc<HeatModel>,
    pub hub: Arc<RealtimeHub>,
    pub harvester: Option<Arc<KnowledgeHarvester>>,
}

impl JobQueue {
    /// Spawn the worker. It runs until every queue handle is dropped.
    pub fn start(ctx: JobContext) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                run(&ctx, job).await;
            }
            debug!("Job queue closed");
        });

        (Self { tx }, handle)
    }

    /// Enqueue a job. Never blocks.
    pub fn submit(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("Job worker is gone, dropping job");
        }
    }

    /// Wait until every job submitted so far has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(Job::Barrier(done_tx));
        let _ = done_rx.await;
    }
}

async fn run(ctx: &JobContext, job: Job) {
    match job {
        Job::PersistInteraction(record) => match ctx.storage.save_interaction(&record).await {
            Ok(()) => info!(
                session_id = %record.session_id,
                intent = %record.detected_intent,
                steps = record.steps.len(),
                "Interaction persisted"
            ),
            Err(e) => error!(session_id = %record.session_id, error = %e, "Failed to persist interaction"),
        },
        Job::PublishTopology { session_id } => {
            let topology = ctx.heat.topology();
            let delivered = ctx.hub.graph_data(&session_id, topology).await;
            debug!(delivered, "Topology published");
        }
        Job::Harvest {
            user_input,
            bot_response,
        } => {
            if let Some(harvester) = &ctx.harvester {
                harvester.harvest(&user_input, &bot_response).await;
            }
        }
        Job::Barrier(done) => {
            let _ = done.send(());
        }
    }
}
