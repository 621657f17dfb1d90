use neuroflow_channels::RealtimeHub;
use neuroflow_core::{GraphLink, GraphNodeView, GraphTopology, HeatDelta, Intent, NeuroResult};
use neuroflow_store::{EdgeInsert, GraphEdge, GraphNode, Storage};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Group tag of the root node.
pub const ROOT_GROUP: &str = "root";
/// Group tag of the seeded pillar nodes.
pub const PILLAR_GROUP: &str = "pillar";
/// Relation label of the seeded root → pillar edges.
pub const PILLAR_RELATION: &str = "pilar";

const EDUCATION: &str = "Educación";
const INVESTMENT: &str = "Inversión";
const GOVERNMENT: &str = "Gobierno";
const STARTUPS: &str = "Startups";
const PILLARS: [&str; 4] = [EDUCATION, INVESTMENT, GOVERNMENT, STARTUPS];

/// Most nodes a focused subgraph selects besides the root.
pub const SUBGRAPH_MAX_NODES: usize = 5;

/// Heat model tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatConfig {
    /// Id of the root node every unmapped intent boosts.
    #[serde(default = "default_root")]
    pub root: String,
    /// Initial weight of the root node.
    #[serde(default = "default_root_weight")]
    pub root_weight: u32,
    /// Initial weight of each pillar node.
    #[serde(default = "default_pillar_weight")]
    pub pillar_weight: u32,
    /// Weight added per boost.
    #[serde(default = "default_boost_step")]
    pub boost_step: u32,
    /// Upper clamp for any node weight.
    #[serde(default = "default_max_weight")]
    pub max_weight: u32,
    /// Cap snapshots to the heaviest N nodes.
    #[serde(default)]
    pub topology_limit: Option<usize>,
}

fn default_root() -> String {
    "CIAY".into()
}
fn default_root_weight() -> u32 {
    40
}
fn default_pillar_weight() -> u32 {
    20
}
fn default_boost_step() -> u32 {
    5
}
fn default_max_weight() -> u32 {
    60
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            root_weight: default_root_weight(),
            pillar_weight: default_pillar_weight(),
            boost_step: default_boost_step(),
            max_weight: default_max_weight(),
            topology_limit: None,
        }
    }
}

/// Display size for a node weight.
pub fn node_size(weight: u32) -> f64 {
    f64::from(weight).sqrt() * 2.0
}

#[derive(Default)]
struct Graph {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
}

impl Graph {
    fn insert_edge(&mut self, edge: &GraphEdge) -> EdgeInsert {
        if !self.nodes.contains_key(&edge.source_id) || !self.nodes.contains_key(&edge.target_id) {
            return EdgeInsert::MissingEndpoint;
        }
        if self
            .edges
            .iter()
            .any(|e| e.source_id == edge.source_id && e.target_id == edge.target_id)
        {
            return EdgeInsert::Duplicate;
        }
        self.edges.push(edge.clone());
        EdgeInsert::Created
    }

    fn snapshot<'a>(&self, included: impl IntoIterator<Item = &'a GraphNode>) -> GraphTopology {
        let nodes: Vec<GraphNodeView> = included
            .into_iter()
            .map(|n| GraphNodeView {
                id: n.id.clone(),
                group: n.group.clone(),
                val: node_size(n.weight),
                weight: n.weight,
            })
            .collect();
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let links = self
            .edges
            .iter()
            .filter(|e| ids.contains(e.source_id.as_str()) && ids.contains(e.target_id.as_str()))
            .map(|e| GraphLink {
                source: e.source_id.clone(),
                target: e.target_id.clone(),
                relation: e.relation.clone(),
            })
            .collect();
        GraphTopology { nodes, links }
    }

    /// Nodes ordered heaviest first, ties by id.
    fn ranked(&self) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.id.cmp(&b.id)));
        nodes
    }
}

/// The live weighted knowledge graph shared across sessions.
///
/// Weights live in memory and are the authority for heat; they are volatile
/// across restarts. Every mutation takes the write lock, so concurrent boosts
/// never lose an increment.
pub struct HeatModel {
    config: HeatConfig,
    graph: RwLock<Graph>,
    hub: Option<Arc<RealtimeHub>>,
}

impl HeatModel {
    /// Create a model seeded with the root and pillar nodes.
    pub fn new(config: HeatConfig) -> Self {
        let mut graph = Graph::default();
        graph.nodes.insert(
            config.root.clone(),
            GraphNode::new(&config.root, ROOT_GROUP, config.root_weight.min(config.max_weight)),
        );
        for pillar in PILLARS {
            graph.nodes.insert(
                pillar.to_string(),
                GraphNode::new(pillar, PILLAR_GROUP, config.pillar_weight.min(config.max_weight)),
            );
            graph.insert_edge(&GraphEdge::new(&config.root, pillar, PILLAR_RELATION));
        }
        Self {
            config,
            graph: RwLock::new(graph),
            hub: None,
        }
    }

    /// Publish heat deltas through the given hub.
    pub fn with_hub(mut self, hub: Arc<RealtimeHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &HeatConfig {
        &self.config
    }

    /// Node a given intent boosts.
    pub fn target_for(&self, intent: Intent) -> &str {
        match intent {
            Intent::Estudiante => EDUCATION,
            Intent::Inversionista => INVESTMENT,
            Intent::Gobierno => GOVERNMENT,
            Intent::Startup => STARTUPS,
            _ => &self.config.root,
        }
    }

    /// Reconcile with persistent storage.
    ///
    /// Seed nodes and edges missing from storage are written so persisted
    /// edges can reference them; persisted nodes and edges missing from
    /// memory are loaded. In-memory weights of existing nodes are kept.
    /// Returns the number of nodes loaded from storage.
    pub async fn sync_with(&self, storage: &dyn Storage) -> NeuroResult<usize> {
        let (seed_nodes, seed_edges) = {
            let graph = self.graph.read();
            (
                graph.nodes.values().cloned().collect::<Vec<_>>(),
                graph.edges.clone(),
            )
        };
        for node in &seed_nodes {
            storage.insert_node(node).await?;
        }
        for edge in &seed_edges {
            storage.insert_edge(edge).await?;
        }

        let nodes = storage.nodes().await?;
        let edges = storage.edges().await?;

        let mut graph = self.graph.write();
        let mut loaded = 0;
        for mut node in nodes {
            if !graph.nodes.contains_key(&node.id) {
                node.weight = node.weight.min(self.config.max_weight);
                graph.nodes.insert(node.id.clone(), node);
                loaded += 1;
            }
        }
        for edge in &edges {
            graph.insert_edge(edge);
        }
        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            loaded,
            "Knowledge graph synced with storage"
        );
        Ok(loaded)
    }

    /// Apply one boost step for `intent` and return the resulting delta.
    ///
    /// The target node is created on first reference.
    pub fn apply_boost(&self, intent: Intent) -> HeatDelta {
        let target = self.target_for(intent).to_string();
        let group = if target == self.config.root {
            ROOT_GROUP
        } else {
            PILLAR_GROUP
        };
        let mut graph = self.graph.write();
        let node = graph
            .nodes
            .entry(target.clone())
            .or_insert_with(|| GraphNode::new(&target, group, 0));
        node.weight = node
            .weight
            .saturating_add(self.config.boost_step)
            .min(self.config.max_weight);
        HeatDelta {
            node_id: target,
            new_weight: node.weight,
        }
    }

    /// Boost the node mapped to `intent` and broadcast the single-node delta.
    pub async fn boost(&self, session_id: &str, intent: Intent) -> HeatDelta {
        let delta = self.apply_boost(intent);
        debug!(intent = %intent, node = %delta.node_id, weight = delta.new_weight, "Node boosted");
        if let Some(hub) = &self.hub {
            hub.graph_heat(session_id, delta.clone()).await;
        }
        delta
    }

    /// Current weight of a node.
    pub fn weight(&self, id: &str) -> Option<u32> {
        self.graph.read().nodes.get(id).map(|n| n.weight)
    }

    /// Whether a node exists.
    pub fn contains(&self, id: &str) -> bool {
        self.graph.read().nodes.contains_key(id)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.read().nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.read().edges.len()
    }

    /// Snapshot of the graph, optionally capped to the heaviest `limit`
    /// nodes. Only links between included nodes are kept.
    pub fn get_topology(&self, limit: Option<usize>) -> GraphTopology {
        let graph = self.graph.read();
        graph.snapshot(graph.ranked().into_iter().take(limit.unwrap_or(usize::MAX)))
    }

    /// Snapshot using the configured limit.
    pub fn topology(&self) -> GraphTopology {
        self.get_topology(self.config.topology_limit)
    }

    /// Focused view: up to five nodes whose id the context mentions, plus
    /// the root. Falls back to the full topology when nothing matches.
    pub fn dynamic_subgraph(&self, context: &str) -> GraphTopology {
        let haystack = context.to_lowercase();
        let graph = self.graph.read();
        let selected: Vec<&GraphNode> = graph
            .ranked()
            .into_iter()
            .filter(|n| n.id != self.config.root && haystack.contains(&n.id.to_lowercase()))
            .take(SUBGRAPH_MAX_NODES)
            .collect();

        if selected.is_empty() {
            let take = self.config.topology_limit.unwrap_or(usize::MAX);
            return graph.snapshot(graph.ranked().into_iter().take(take));
        }

        let root = graph.nodes.get(&self.config.root);
        graph.snapshot(root.into_iter().chain(selected))
    }

    /// Insert a node if absent. Returns `false` if it already existed.
    pub fn merge_node(&self, node: &GraphNode) -> bool {
        let mut graph = self.graph.write();
        if graph.nodes.contains_key(&node.id) {
            return false;
        }
        let mut node = node.clone();
        node.weight = node.weight.min(self.config.max_weight);
        graph.nodes.insert(node.id.clone(), node);
        true
    }

    /// Add `step` to an existing node's weight, clamped.
    pub fn reinforce(&self, id: &str, step: u32) -> Option<u32> {
        let max = self.config.max_weight;
        self.graph.write().nodes.get_mut(id).map(|n| {
            n.weight = n.weight.saturating_add(step).min(max);
            n.weight
        })
    }

    /// Insert an edge under the endpoint and uniqueness invariants.
    pub fn merge_edge(&self, edge: &GraphEdge) -> EdgeInsert {
        self.graph.write().insert_edge(edge)
    }
}

impl Default for HeatModel {
    fn default() -> Self {
        Self::new(HeatConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use neuroflow_store::InMemoryStorage;

    #[test]
    fn test_seeded_topology() {
        let heat = HeatModel::default();
        let topo = heat.get_topology(None);
        assert_eq!(topo.nodes.len(), 5);
        assert_eq!(topo.links.len(), 4);
        assert_eq!(topo.nodes[0].id, "CIAY");
        assert_eq!(topo.nodes[0].group, ROOT_GROUP);
        assert!(topo.links.iter().all(|l| l.source == "CIAY" && l.relation == "pilar"));
    }

    #[test]
    fn test_boost_saturates_at_clamp() {
        let heat = HeatModel::default();
        for n in 1..=10u32 {
            let delta = heat.apply_boost(Intent::Estudiante);
            assert_eq!(delta.node_id, "Educación");
            assert_eq!(delta.new_weight, (20 + n * 5).min(60));
        }
        assert_eq!(heat.weight("Educación"), Some(60));
    }

    #[test]
    fn test_unmapped_intents_boost_root() {
        let heat = HeatModel::default();
        for intent in [Intent::General, Intent::Contacto, Intent::Ciudadano] {
            assert_eq!(heat.apply_boost(intent).node_id, "CIAY");
        }
        assert_eq!(heat.weight("CIAY"), Some(55));
    }

    #[test]
    fn test_concurrent_boosts_are_not_lost() {
        let heat = Arc::new(HeatModel::new(HeatConfig {
            max_weight: 10_000,
            ..HeatConfig::default()
        }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let heat = heat.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        heat.apply_boost(Intent::Gobierno);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(heat.weight("Gobierno"), Some(20 + 8 * 50 * 5));
    }

    #[test]
    fn test_topology_limit_keeps_heaviest_and_their_links() {
        let heat = HeatModel::default();
        heat.apply_boost(Intent::Startup);
        let topo = heat.get_topology(Some(2));
        let ids: Vec<_> = topo.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["CIAY", "Startups"]);
        assert_eq!(topo.links.len(), 1);
        assert_eq!(topo.links[0].target, "Startups");
    }

    #[test]
    fn test_size_transform() {
        let heat = HeatModel::default();
        let topo = heat.get_topology(None);
        let root = topo.nodes.iter().find(|n| n.id == "CIAY").unwrap();
        assert!((root.val - 40f64.sqrt() * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_dynamic_subgraph_focuses_on_mentions() {
        let heat = HeatModel::default();
        let topo = heat.dynamic_subgraph("Programas de inversión y startups en la región");
        let mut ids: Vec<_> = topo.nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["CIAY", "Inversión", "Startups"]);
        assert_eq!(topo.links.len(), 2);
    }

    #[test]
    fn test_dynamic_subgraph_caps_selection() {
        let heat = HeatModel::default();
        let mut context = String::new();
        for i in 0..8 {
            let id = format!("Tema{i}");
            heat.merge_node(&GraphNode::new(&id, "concept", i));
            context.push_str(&id);
            context.push(' ');
        }
        let topo = heat.dynamic_subgraph(&context);
        assert_eq!(topo.nodes.len(), SUBGRAPH_MAX_NODES + 1);
        assert!(topo.contains("CIAY"));
        assert!(topo.contains("Tema7"));
        assert!(!topo.contains("Tema0"));
    }

    #[test]
    fn test_dynamic_subgraph_falls_back_to_full() {
        let heat = HeatModel::default();
        let topo = heat.dynamic_subgraph("nada relevante");
        assert_eq!(topo, heat.get_topology(None));
    }

    #[test]
    fn test_merge_edge_invariants() {
        let heat = HeatModel::default();
        let dangling = GraphEdge::new("CIAY", "Fantasma", "rel");
        assert_eq!(heat.merge_edge(&dangling), EdgeInsert::MissingEndpoint);
        assert!(!heat.contains("Fantasma"));

        let dup = GraphEdge::new("CIAY", "Gobierno", "otra");
        assert_eq!(heat.merge_edge(&dup), EdgeInsert::Duplicate);
        assert_eq!(heat.edge_count(), 4);
    }

    #[tokio::test]
    async fn test_sync_persists_seed_and_loads_harvested_nodes() {
        let storage = InMemoryStorage::new();
        storage.insert_node(&GraphNode::new("IA", "concept", 3)).await.unwrap();

        let heat = HeatModel::default();
        storage.insert_node(&GraphNode::new("CIAY", "root", 1)).await.unwrap();
        let loaded = heat.sync_with(&storage).await.unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(heat.weight("IA"), Some(3));
        assert_eq!(heat.weight("CIAY"), Some(40));
        assert_eq!(storage.nodes().await.unwrap().len(), 6);
        assert_eq!(storage.edges().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_boost_broadcasts_heat_delta() {
        let hub = RealtimeHub::new();
        let mut observer = hub.subscribe("otra-sesion").await;
        let heat = HeatModel::default().with_hub(hub);

        heat.boost("s1", Intent::Inversionista).await;

        let msg: serde_json::Value =
            serde_json::from_str(&observer.receiver.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "graph_heat");
        assert_eq!(msg["payload"]["node_id"], "Inversión");
        assert_eq!(msg["payload"]["new_weight"], 25);
        assert_eq!(msg["session_id"], "s1");
    }
}
