use crate::heat::HeatModel;
use async_trait::async_trait;
use neuroflow_core::NeuroResult;
use neuroflow_store::{EdgeInsert, GraphEdge, GraphNode, Storage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A proposed node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateNode {
    /// Proposed id, also the display label.
    pub id: String,
    /// Category tag.
    #[serde(default = "default_group")]
    pub group: String,
}

/// A proposed directed edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEdge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Relation label.
    #[serde(default = "default_relation")]
    pub relation: String,
}

fn default_group() -> String {
    "concept".into()
}

fn default_relation() -> String {
    "relacionado".into()
}

/// Nodes and edges proposed from one exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidates {
    /// Proposed nodes.
    #[serde(default)]
    pub nodes: Vec<CandidateNode>,
    /// Proposed edges.
    #[serde(default)]
    pub edges: Vec<CandidateEdge>,
}

/// Capability that proposes graph additions from a finished exchange.
#[async_trait]
pub trait CandidateExtractor: Send + Sync {
    /// Propose nodes and edges for the given exchange.
    async fn extract(&self, user_input: &str, bot_response: &str) -> NeuroResult<Candidates>;
}

/// What a harvest pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub nodes_created: usize,
    pub nodes_reinforced: usize,
    pub nodes_rejected: usize,
    pub edges_created: usize,
    pub edges_skipped: usize,
    /// Individual writes that failed and were skipped.
    pub failures: usize,
}

/// Grows the knowledge graph from finished exchanges.
///
/// Storage is written first; the in-memory [`HeatModel`] only mirrors writes
/// that committed. Nothing here ever returns an error to the caller.
pub struct KnowledgeHarvester {
    storage: Arc<dyn Storage>,
    heat: Arc<HeatModel>,
    extractor: Arc<dyn CandidateExtractor>,
    max_node_id_len: usize,
    reinforce_step: u32,
}

impl KnowledgeHarvester {
    /// Create a harvester.
    pub fn new(
        storage: Arc<dyn Storage>,
        heat: Arc<HeatModel>,
        extractor: Arc<dyn CandidateExtractor>,
    ) -> Self {
        Self {
            storage,
            heat,
            extractor,
            max_node_id_len: 40,
            reinforce_step: 1,
        }
    }

    /// Longest accepted node id, in characters.
    pub fn with_max_node_id_len(mut self, len: usize) -> Self {
        self.max_node_id_len = len;
        self
    }

    /// Extract candidates from an exchange and apply them.
    pub async fn harvest(&self, user_input: &str, bot_response: &str) -> HarvestReport {
        match self.extractor.extract(user_input, bot_response).await {
            Ok(candidates) => self.apply(&candidates).await,
            Err(e) => {
                warn!(error = %e, "Knowledge extraction failed, skipping harvest");
                HarvestReport::default()
            }
        }
    }

    /// Apply candidates under the graph invariants.
    ///
    /// New nodes are created only when their id is non-empty and within the
    /// length bound; existing nodes get a weight increment instead. Edges are
    /// created only when both endpoints exist and the directed pair is new.
    pub async fn apply(&self, candidates: &Candidates) -> HarvestReport {
        let mut report = HarvestReport::default();
        let max_weight = self.heat.config().max_weight;

        for candidate in &candidates.nodes {
            let id = candidate.id.trim();
            let len = id.chars().count();
            if len == 0 || len > self.max_node_id_len {
                debug!(id = %candidate.id, "Rejected node candidate");
                report.nodes_rejected += 1;
                continue;
            }

            let existing = match self.storage.get_node(id).await {
                Ok(node) => node,
                Err(e) => {
                    warn!(id, error = %e, "Node lookup failed");
                    report.failures += 1;
                    continue;
                }
            };

            if existing.is_some() {
                match self
                    .storage
                    .add_node_weight(id, self.reinforce_step, max_weight)
                    .await
                {
                    Ok(_) => {
                        self.heat.reinforce(id, self.reinforce_step);
                        report.nodes_reinforced += 1;
                    }
                    Err(e) => {
                        warn!(id, error = %e, "Node reinforcement failed");
                        report.failures += 1;
                    }
                }
                continue;
            }

            let node = GraphNode::new(id, candidate.group.trim(), self.reinforce_step);
            match self.storage.insert_node(&node).await {
                Ok(true) => {
                    self.heat.merge_node(&node);
                    report.nodes_created += 1;
                }
                Ok(false) => debug!(id, "Node created concurrently, skipping"),
                Err(e) => {
                    warn!(id, error = %e, "Node insert failed");
                    report.failures += 1;
                }
            }
        }

        for candidate in &candidates.edges {
            let edge = GraphEdge::new(
                candidate.source.trim(),
                candidate.target.trim(),
                candidate.relation.trim(),
            );
            match self.storage.insert_edge(&edge).await {
                Ok(EdgeInsert::Created) => {
                    self.heat.merge_edge(&edge);
                    report.edges_created += 1;
                }
                Ok(outcome) => {
                    debug!(
                        source = %edge.source_id,
                        target = %edge.target_id,
                        ?outcome,
                        "Edge candidate skipped"
                    );
                    report.edges_skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Edge insert failed");
                    report.failures += 1;
                }
            }
        }

        info!(
            created = report.nodes_created,
            reinforced = report.nodes_reinforced,
            edges = report.edges_created,
            failures = report.failures,
            "Knowledge harvest applied"
        );
        report
    }
}
