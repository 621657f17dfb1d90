use crate::directive::{ContactData, CourseData, ReportData, ToolDirective};
use chrono::Utc;
use neuroflow_core::{NeuroError, NeuroResult};
use neuroflow_store::{CitizenReport, ContactLead, CourseRegistration, Storage};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Prefix of citizen report folios.
pub const TICKET_PREFIX: &str = "REP-";
/// Status of a freshly filed report.
pub const REPORT_OPEN: &str = "ABIERTO";
/// Folio draws attempted before giving up on a collision.
pub const TICKET_ATTEMPTS: usize = 3;

/// Result status of a tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// What a handler reports back.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub status: ToolStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            message: message.into(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

type TicketSource = Box<dyn Fn() -> NeuroResult<String> + Send + Sync>;

/// `REP-` followed by six random digits.
pub fn random_ticket() -> NeuroResult<String> {
    let mut bytes = [0u8; 4];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| NeuroError::Persistence(format!("ticket entropy: {e}")))?;
    let n = u32::from_le_bytes(bytes) % 1_000_000;
    Ok(format!("{TICKET_PREFIX}{n:06}"))
}

/// Dispatches validated directives to their handlers.
///
/// Each handler performs exactly one persistent write. Failures are turned
/// into an error outcome and never escape.
pub struct ToolExecutor {
    storage: Arc<dyn Storage>,
    tickets: TicketSource,
}

impl ToolExecutor {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            tickets: Box::new(random_ticket),
        }
    }

    /// Replace the folio generator.
    pub fn with_ticket_source(
        mut self,
        source: impl Fn() -> NeuroResult<String> + Send + Sync + 'static,
    ) -> Self {
        self.tickets = Box::new(source);
        self
    }

    pub async fn execute(&self, directive: &ToolDirective) -> ToolOutcome {
        let action = directive.action();
        let result = match directive {
            ToolDirective::SaveContact(data) => self.save_contact(data).await,
            ToolDirective::RegisterCourse(data) => self.register_course(data).await,
            ToolDirective::CreateReport(data) => self.create_report(data).await,
        };
        match result {
            Ok(outcome) => {
                info!(action, "Tool executed");
                outcome
            }
            Err(e) => {
                error!(action, error = %e, "Tool execution failed");
                ToolOutcome::error("Error de base de datos.")
            }
        }
    }

    async fn save_contact(&self, data: &ContactData) -> NeuroResult<ToolOutcome> {
        let lead = ContactLead {
            id: Uuid::new_v4(),
            nombre: data.nombre.trim().to_string(),
            correo: data.correo.trim().to_string(),
            empresa: data.empresa.clone(),
            telefono: data.telefono.clone(),
            interes: data.interes.trim().to_string(),
            mensaje: data.mensaje.clone(),
            created_at: Utc::now(),
        };
        self.storage.save_lead(&lead).await?;
        Ok(ToolOutcome::success("Contacto guardado en CRM.")
            .with_data(serde_json::json!({ "lead_id": lead.id })))
    }

    async fn register_course(&self, data: &CourseData) -> NeuroResult<ToolOutcome> {
        let registration = CourseRegistration {
            id: Uuid::new_v4(),
            student_name: data.nombre.trim().to_string(),
            email: data.correo.trim().to_string(),
            course_name: data.curso.trim().to_string(),
            created_at: Utc::now(),
        };
        self.storage.save_course_registration(&registration).await?;
        Ok(
            ToolOutcome::success(format!("Inscripción exitosa en {}.", registration.course_name))
                .with_data(serde_json::json!({ "registration_id": registration.id })),
        )
    }

    async fn create_report(&self, data: &ReportData) -> NeuroResult<ToolOutcome> {
        for attempt in 1..=TICKET_ATTEMPTS {
            let report = CitizenReport {
                id: Uuid::new_v4(),
                ticket_id: (self.tickets)()?,
                report_type: data.tipo.trim().to_string(),
                description: data.descripcion.trim().to_string(),
                location: data.ubicacion.trim().to_string(),
                status: REPORT_OPEN.to_string(),
                created_at: Utc::now(),
            };
            if self.storage.save_report(&report).await? {
                return Ok(ToolOutcome::success(format!(
                    "Reporte registrado con folio {}.",
                    report.ticket_id
                ))
                .with_data(serde_json::json!({
                    "ticket_id": report.ticket_id,
                    "status": report.status,
                })));
            }
            warn!(attempt, ticket = %report.ticket_id, "Ticket collision, drawing again");
        }
        Err(NeuroError::Persistence(format!(
            "no free ticket after {TICKET_ATTEMPTS} attempts"
        )))
    }
}
