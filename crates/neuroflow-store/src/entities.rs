use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A weighted knowledge graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable id, also the display label.
    pub id: String,
    /// Category tag.
    pub group: String,
    /// Heat weight.
    pub weight: u32,
}

impl GraphNode {
    /// Creates a node.
    pub fn new(id: impl Into<String>, group: impl Into<String>, weight: u32) -> Self {
        Self {
            id: id.into(),
            group: group.into(),
            weight,
        }
    }
}

/// A directed, labelled edge. At most one exists per ordered `(source, target)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id.
    pub source_id: String,
    /// Target node id.
    pub target_id: String,
    /// Relation label.
    pub relation: String,
}

impl GraphEdge {
    /// Creates an edge.
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation: relation.into(),
        }
    }
}

/// Outcome of an edge insertion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// The edge was written.
    Created,
    /// The same directed pair already existed; nothing was written.
    Duplicate,
    /// One or both endpoints do not exist; nothing was written.
    MissingEndpoint,
}

/// A sales/partnership lead captured by the `save_contact` directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactLead {
    pub id: Uuid,
    pub nombre: String,
    pub correo: String,
    pub empresa: Option<String>,
    pub telefono: Option<String>,
    pub interes: String,
    pub mensaje: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A course sign-up captured by the `register_course` directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRegistration {
    pub id: Uuid,
    pub student_name: String,
    pub email: String,
    pub course_name: String,
    pub created_at: DateTime<Utc>,
}

/// A citizen report captured by the `create_report` directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenReport {
    pub id: Uuid,
    /// Human-facing folio. Stores reject duplicates.
    pub ticket_id: String,
    pub report_type: String,
    pub description: String,
    pub location: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
