use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`StepEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The stage has started and has not finished yet.
    Running,
    /// The stage finished and produced its expected result.
    Success,
    /// The stage failed; the request degraded around it.
    Failed,
    /// Terminal marker for a stage with no success/failure semantics.
    Done,
}

/// An ephemeral progress message describing one stage of request processing.
///
/// Step events live for a single request: they are broadcast to observers as
/// they happen and the full ordered trace ends up in the
/// [`InteractionRecord`](crate::InteractionRecord).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    /// Short stage label such as `[SEMANTIC]` or `[VALIDATOR]`.
    pub step: String,
    /// Human-readable detail line.
    pub detail: String,
    /// Stage status.
    pub status: StepStatus,
    /// Optional structured payload attached to the stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl StepEvent {
    /// Creates an event with no structured payload.
    pub fn new(step: impl Into<String>, detail: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step: step.into(),
            detail: detail.into(),
            status,
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches a structured payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A graph node as rendered by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNodeView {
    /// Stable node id.
    pub id: String,
    /// Category tag (`root`, `pillar`, `concept`, ...).
    pub group: String,
    /// Display size derived from the node weight.
    pub val: f64,
    /// Raw heat weight.
    pub weight: u32,
}

/// A directed graph edge as rendered by observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Relation label.
    pub relation: String,
}

/// A snapshot of the graph topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphTopology {
    /// Nodes in the snapshot.
    pub nodes: Vec<GraphNodeView>,
    /// Edges whose endpoints are both in `nodes`.
    pub links: Vec<GraphLink>,
}

impl GraphTopology {
    /// Returns true if a node with the given id is part of the snapshot.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }
}

/// A single-node heat change, broadcast for low-latency animation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatDelta {
    /// The boosted node.
    pub node_id: String,
    /// Weight after the boost was applied.
    pub new_weight: u32,
}

/// Tagged payload pushed over the realtime channel.
///
/// Serializes as `{"type": "log" | "graph_data" | "graph_heat", "payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BroadcastMessage {
    /// A request step event.
    Log(StepEvent),
    /// A full topology snapshot.
    GraphData(GraphTopology),
    /// A single-node heat delta.
    GraphHeat(HeatDelta),
}

/// Envelope for every message sent to observers: the payload plus the
/// session it originated from.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    /// Originating session id.
    pub session_id: String,
    /// The tagged payload.
    #[serde(flatten)]
    pub message: BroadcastMessage,
}

impl RealtimeEvent {
    /// Wraps a payload for the given session.
    pub fn new(session_id: impl Into<String>, message: BroadcastMessage) -> Self {
        Self {
            session_id: session_id.into(),
            message,
        }
    }

    /// Returns true for payloads that concern a single session.
    pub fn is_session_scoped(&self) -> bool {
        matches!(self.message, BroadcastMessage::Log(_))
    }
}
