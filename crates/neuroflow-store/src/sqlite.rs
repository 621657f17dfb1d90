use crate::entities::{
    CitizenReport, ContactLead, CourseRegistration, EdgeInsert, GraphEdge, GraphNode,
};
use crate::store::Storage;
use async_trait::async_trait;
use neuroflow_core::{InteractionRecord, NeuroError, NeuroResult, SentimentLabel};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS interaction_logs (
    id              TEXT PRIMARY KEY,
    session_id      TEXT NOT NULL,
    user_input      TEXT NOT NULL,
    bot_response    TEXT NOT NULL,
    detected_intent TEXT NOT NULL,
    execution_steps TEXT NOT NULL,
    sentiment_score REAL NOT NULL,
    sentiment_label TEXT NOT NULL,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_interaction_logs_session ON interaction_logs(session_id);

CREATE TABLE IF NOT EXISTS graph_nodes (
    id     TEXT PRIMARY KEY,
    grp    TEXT NOT NULL,
    weight INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS graph_edges (
    source_id TEXT NOT NULL REFERENCES graph_nodes(id),
    target_id TEXT NOT NULL REFERENCES graph_nodes(id),
    relation  TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id)
);

CREATE TABLE IF NOT EXISTS contact_leads (
    id         TEXT PRIMARY KEY,
    nombre     TEXT NOT NULL,
    correo     TEXT NOT NULL,
    empresa    TEXT,
    telefono   TEXT,
    interes    TEXT NOT NULL,
    mensaje    TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS course_registrations (
    id           TEXT PRIMARY KEY,
    student_name TEXT NOT NULL,
    email        TEXT NOT NULL,
    course_name  TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS citizen_reports (
    id          TEXT PRIMARY KEY,
    ticket_id   TEXT NOT NULL UNIQUE,
    report_type TEXT NOT NULL,
    description TEXT NOT NULL,
    location    TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
";

/// SQLite-backed [`Storage`].
///
/// rusqlite is blocking, so every operation runs on the blocking pool behind
/// a shared connection mutex.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> NeuroResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(persistence)?;
        info!(path = %path.display(), "Opened SQLite storage");
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> NeuroResult<Self> {
        Self::init(Connection::open_in_memory().map_err(persistence)?)
    }

    fn init(conn: Connection) -> NeuroResult<Self> {
        conn.execute_batch(SCHEMA).map_err(persistence)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> NeuroResult<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            op(&mut *guard)
        })
        .await
        .map_err(|e| NeuroError::Persistence(format!("storage task failed: {e}")))?
        .map_err(persistence)
    }
}

fn persistence(e: rusqlite::Error) -> NeuroError {
    NeuroError::Persistence(e.to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn uuid_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn sentiment_from_str(raw: &str) -> SentimentLabel {
    match raw {
        "POSITIVO" => SentimentLabel::Positivo,
        "NEGATIVO" => SentimentLabel::Negativo,
        _ => SentimentLabel::Neutro,
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_interaction(&self, record: &InteractionRecord) -> NeuroResult<()> {
        let steps = serde_json::to_string(&record.steps)?;
        let record = record.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO interaction_logs (id, session_id, user_input, bot_response, \
                 detected_intent, execution_steps, sentiment_score, sentiment_label, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id.to_string(),
                    record.session_id,
                    record.user_input,
                    record.bot_response,
                    record.detected_intent,
                    steps,
                    f64::from(record.sentiment_score),
                    record.sentiment_label.as_str(),
                    record.created_at,
                ],
            )?;
            tx.commit()
        })
        .await
    }

    async fn interactions(&self, session_id: Option<&str>) -> NeuroResult<Vec<InteractionRecord>> {
        let session_id = session_id.map(str::to_owned);
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, user_input, bot_response, detected_intent, \
                 execution_steps, sentiment_score, sentiment_label, created_at \
                 FROM interaction_logs WHERE (?1 IS NULL OR session_id = ?1) \
                 ORDER BY created_at, rowid",
            )?;
            let records = stmt
                .query_map(params![session_id], |row| {
                    let steps_json: String = row.get(5)?;
                    let steps =
                        serde_json::from_str(&steps_json).map_err(|e| conversion_error(5, e))?;
                    let score: f64 = row.get(6)?;
                    let label: String = row.get(7)?;
                    Ok(InteractionRecord {
                        id: uuid_at(row, 0)?,
                        session_id: row.get(1)?,
                        user_input: row.get(2)?,
                        bot_response: row.get(3)?,
                        detected_intent: row.get(4)?,
                        steps,
                        sentiment_score: score as f32,
                        sentiment_label: sentiment_from_str(&label),
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn get_node(&self, id: &str) -> NeuroResult<Option<GraphNode>> {
        let id = id.to_owned();
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, grp, weight FROM graph_nodes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(GraphNode {
                        id: row.get(0)?,
                        group: row.get(1)?,
                        weight: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn insert_node(&self, node: &GraphNode) -> NeuroResult<bool> {
        let node = node.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO graph_nodes (id, grp, weight) VALUES (?1, ?2, ?3)",
                params![node.id, node.group, node.weight],
            )?;
            tx.commit()?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn add_node_weight(&self, id: &str, delta: u32, max: u32) -> NeuroResult<Option<u32>> {
        let id = id.to_owned();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<u32> = tx
                .query_row(
                    "SELECT weight FROM graph_nodes WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(current) = current else {
                return Ok(None);
            };
            let updated = current.saturating_add(delta).min(max);
            tx.execute(
                "UPDATE graph_nodes SET weight = ?1 WHERE id = ?2",
                params![updated, id],
            )?;
            tx.commit()?;
            Ok(Some(updated))
        })
        .await
    }

    async fn nodes(&self) -> NeuroResult<Vec<GraphNode>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT id, grp, weight FROM graph_nodes ORDER BY id")?;
            let nodes = stmt
                .query_map([], |row| {
                    Ok(GraphNode {
                        id: row.get(0)?,
                        group: row.get(1)?,
                        weight: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(nodes)
        })
        .await
    }

    async fn insert_edge(&self, edge: &GraphEdge) -> NeuroResult<EdgeInsert> {
        let edge = edge.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let expected: i64 = if edge.source_id == edge.target_id { 1 } else { 2 };
            let present: i64 = tx.query_row(
                "SELECT COUNT(*) FROM graph_nodes WHERE id = ?1 OR id = ?2",
                params![edge.source_id, edge.target_id],
                |row| row.get(0),
            )?;
            if present < expected {
                return Ok(EdgeInsert::MissingEndpoint);
            }
            let exists = tx
                .query_row(
                    "SELECT 1 FROM graph_edges WHERE source_id = ?1 AND target_id = ?2",
                    params![edge.source_id, edge.target_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                return Ok(EdgeInsert::Duplicate);
            }
            tx.execute(
                "INSERT INTO graph_edges (source_id, target_id, relation) VALUES (?1, ?2, ?3)",
                params![edge.source_id, edge.target_id, edge.relation],
            )?;
            tx.commit()?;
            Ok(EdgeInsert::Created)
        })
        .await
    }

    async fn edges(&self) -> NeuroResult<Vec<GraphEdge>> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare("SELECT source_id, target_id, relation FROM graph_edges ORDER BY rowid")?;
            let edges = stmt
                .query_map([], |row| {
                    Ok(GraphEdge {
                        source_id: row.get(0)?,
                        target_id: row.get(1)?,
                        relation: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(edges)
        })
        .await
    }

    async fn save_lead(&self, lead: &ContactLead) -> NeuroResult<()> {
        let lead = lead.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO contact_leads (id, nombre, correo, empresa, telefono, interes, \
                 mensaje, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    lead.id.to_string(),
                    lead.nombre,
                    lead.correo,
                    lead.empresa,
                    lead.telefono,
                    lead.interes,
                    lead.mensaje,
                    lead.created_at,
                ],
            )?;
            tx.commit()
        })
        .await
    }

    async fn leads(&self) -> NeuroResult<Vec<ContactLead>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, nombre, correo, empresa, telefono, interes, mensaje, created_at \
                 FROM contact_leads ORDER BY created_at, rowid",
            )?;
            let leads = stmt
                .query_map([], |row| {
                    Ok(ContactLead {
                        id: uuid_at(row, 0)?,
                        nombre: row.get(1)?,
                        correo: row.get(2)?,
                        empresa: row.get(3)?,
                        telefono: row.get(4)?,
                        interes: row.get(5)?,
                        mensaje: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(leads)
        })
        .await
    }

    async fn save_course_registration(
        &self,
        registration: &CourseRegistration,
    ) -> NeuroResult<()> {
        let reg = registration.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO course_registrations (id, student_name, email, course_name, \
                 created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    reg.id.to_string(),
                    reg.student_name,
                    reg.email,
                    reg.course_name,
                    reg.created_at,
                ],
            )?;
            tx.commit()
        })
        .await
    }

    async fn course_registrations(&self) -> NeuroResult<Vec<CourseRegistration>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, student_name, email, course_name, created_at \
                 FROM course_registrations ORDER BY created_at, rowid",
            )?;
            let regs = stmt
                .query_map([], |row| {
                    Ok(CourseRegistration {
                        id: uuid_at(row, 0)?,
                        student_name: row.get(1)?,
                        email: row.get(2)?,
                        course_name: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(regs)
        })
        .await
    }

    async fn save_report(&self, report: &CitizenReport) -> NeuroResult<bool> {
        let report = report.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO citizen_reports (id, ticket_id, report_type, description, \
                 location, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    report.id.to_string(),
                    report.ticket_id,
                    report.report_type,
                    report.description,
                    report.location,
                    report.status,
                    report.created_at,
                ],
            );
            match inserted {
                Ok(_) => {
                    tx.commit()?;
                    Ok(true)
                }
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn reports(&self) -> NeuroResult<Vec<CitizenReport>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ticket_id, report_type, description, location, status, created_at \
                 FROM citizen_reports ORDER BY created_at, rowid",
            )?;
            let reports = stmt
                .query_map([], |row| {
                    Ok(CitizenReport {
                        id: uuid_at(row, 0)?,
                        ticket_id: row.get(1)?,
                        report_type: row.get(2)?,
                        description: row.get(3)?,
                        location: row.get(4)?,
                        status: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(reports)
        })
        .await
    }
}
