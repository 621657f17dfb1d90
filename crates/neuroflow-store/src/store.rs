use crate::entities::{
    CitizenReport, ContactLead, CourseRegistration, EdgeInsert, GraphEdge, GraphNode,
};
use async_trait::async_trait;
use neuroflow_core::{InteractionRecord, NeuroError, NeuroResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Trait for storage backends.
///
/// Writes are single-row and atomic. Graph edge writes enforce that both
/// endpoints exist and that the directed pair is not already present.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Append an interaction record.
    async fn save_interaction(&self, record: &InteractionRecord) -> NeuroResult<()>;

    /// List interaction records, oldest first, optionally for one session.
    async fn interactions(&self, session_id: Option<&str>) -> NeuroResult<Vec<InteractionRecord>>;

    /// Look up a node by id.
    async fn get_node(&self, id: &str) -> NeuroResult<Option<GraphNode>>;

    /// Insert a node. Returns `false` (and writes nothing) if the id exists.
    async fn insert_node(&self, node: &GraphNode) -> NeuroResult<bool>;

    /// Add `delta` to a node's weight, clamped to `max`. Returns the new
    /// weight, or `None` if the node does not exist.
    async fn add_node_weight(&self, id: &str, delta: u32, max: u32) -> NeuroResult<Option<u32>>;

    /// All nodes, ordered by id.
    async fn nodes(&self) -> NeuroResult<Vec<GraphNode>>;

    /// Insert a directed edge, enforcing the endpoint and uniqueness invariants.
    async fn insert_edge(&self, edge: &GraphEdge) -> NeuroResult<EdgeInsert>;

    /// All edges in insertion order.
    async fn edges(&self) -> NeuroResult<Vec<GraphEdge>>;

    /// Persist a contact lead.
    async fn save_lead(&self, lead: &ContactLead) -> NeuroResult<()>;

    /// All contact leads, oldest first.
    async fn leads(&self) -> NeuroResult<Vec<ContactLead>>;

    /// Persist a course registration.
    async fn save_course_registration(&self, registration: &CourseRegistration)
        -> NeuroResult<()>;

    /// All course registrations, oldest first.
    async fn course_registrations(&self) -> NeuroResult<Vec<CourseRegistration>>;

    /// Persist a citizen report. Returns `false` (and writes nothing) if the
    /// ticket id is already taken.
    async fn save_report(&self, report: &CitizenReport) -> NeuroResult<bool>;

    /// All citizen reports, oldest first.
    async fn reports(&self) -> NeuroResult<Vec<CitizenReport>>;
}

#[derive(Default)]
struct MemoryState {
    interactions: Vec<InteractionRecord>,
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    leads: Vec<ContactLead>,
    registrations: Vec<CourseRegistration>,
    reports: Vec<CitizenReport>,
}

/// In-memory storage. Suitable for tests and demo runs without a data dir.
///
/// Writes can be made to fail on demand to exercise persistence-failure paths.
#[derive(Default)]
pub struct InMemoryStorage {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl InMemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every write returns a [`NeuroError::Persistence`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> NeuroResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(NeuroError::Persistence("storage is rejecting writes".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_interaction(&self, record: &InteractionRecord) -> NeuroResult<()> {
        self.check_writable()?;
        self.state.lock().interactions.push(record.clone());
        Ok(())
    }

    async fn interactions(&self, session_id: Option<&str>) -> NeuroResult<Vec<InteractionRecord>> {
        let state = self.state.lock();
        Ok(state
            .interactions
            .iter()
            .filter(|r| session_id.map_or(true, |sid| r.session_id == sid))
            .cloned()
            .collect())
    }

    async fn get_node(&self, id: &str) -> NeuroResult<Option<GraphNode>> {
        Ok(self.state.lock().nodes.get(id).cloned())
    }

    async fn insert_node(&self, node: &GraphNode) -> NeuroResult<bool> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if state.nodes.contains_key(&node.id) {
            return Ok(false);
        }
        state.nodes.insert(node.id.clone(), node.clone());
        Ok(true)
    }

    async fn add_node_weight(&self, id: &str, delta: u32, max: u32) -> NeuroResult<Option<u32>> {
        self.check_writable()?;
        let mut state = self.state.lock();
        Ok(state.nodes.get_mut(id).map(|node| {
            node.weight = node.weight.saturating_add(delta).min(max);
            node.weight
        }))
    }

    async fn nodes(&self) -> NeuroResult<Vec<GraphNode>> {
        Ok(self.state.lock().nodes.values().cloned().collect())
    }

    async fn insert_edge(&self, edge: &GraphEdge) -> NeuroResult<EdgeInsert> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if !state.nodes.contains_key(&edge.source_id) || !state.nodes.contains_key(&edge.target_id)
        {
            return Ok(EdgeInsert::MissingEndpoint);
        }
        if state
            .edges
            .iter()
            .any(|e| e.source_id == edge.source_id && e.target_id == edge.target_id)
        {
            return Ok(EdgeInsert::Duplicate);
        }
        state.edges.push(edge.clone());
        Ok(EdgeInsert::Created)
    }

    async fn edges(&self) -> NeuroResult<Vec<GraphEdge>> {
        Ok(self.state.lock().edges.clone())
    }

    async fn save_lead(&self, lead: &ContactLead) -> NeuroResult<()> {
        self.check_writable()?;
        self.state.lock().leads.push(lead.clone());
        Ok(())
    }

    async fn leads(&self) -> NeuroResult<Vec<ContactLead>> {
        Ok(self.state.lock().leads.clone())
    }

    async fn save_course_registration(
        &self,
        registration: &CourseRegistration,
    ) -> NeuroResult<()> {
        self.check_writable()?;
        self.state.lock().registrations.push(registration.clone());
        Ok(())
    }

    async fn course_registrations(&self) -> NeuroResult<Vec<CourseRegistration>> {
        Ok(self.state.lock().registrations.clone())
    }

    async fn save_report(&self, report: &CitizenReport) -> NeuroResult<bool> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if state.reports.iter().any(|r| r.ticket_id == report.ticket_id) {
            return Ok(false);
        }
        state.reports.push(report.clone());
        Ok(true)
    }

    async fn reports(&self) -> NeuroResult<Vec<CitizenReport>> {
        Ok(self.state.lock().reports.clone())
    }
}
