use neuroflow_core::{NeuroError, NeuroResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Marks the start of a directive payload in generated text.
pub const OPEN_DELIMITER: &str = "@@TOOL_CALL:";
/// Marks the end of a directive payload.
pub const CLOSE_DELIMITER: &str = "@@";

/// Payload of `save_contact`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactData {
    pub nombre: String,
    pub correo: String,
    pub interes: String,
    #[serde(default)]
    pub empresa: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
}

/// Payload of `register_course`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourseData {
    pub nombre: String,
    pub correo: String,
    pub curso: String,
}

/// Payload of `create_report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportData {
    /// Report category (bache, alumbrado, ...).
    pub tipo: String,
    pub descripcion: String,
    pub ubicacion: String,
}

/// A validated side-effect request embedded in generated text.
///
/// Wire form: `{"action": "<tag>", "data": {...}}`. Unknown tags, missing
/// required fields and wrong-typed fields are all rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum ToolDirective {
    SaveContact(ContactData),
    RegisterCourse(CourseData),
    CreateReport(ReportData),
}

#[allow(clippy::expect_used)]
fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static pattern"))
}

fn require(field: &str, value: &str) -> NeuroResult<()> {
    if value.trim().is_empty() {
        return Err(NeuroError::Validation(format!("field '{field}' is empty")));
    }
    Ok(())
}

fn require_email(value: &str) -> NeuroResult<()> {
    require("correo", value)?;
    if !email_regex().is_match(value.trim()) {
        return Err(NeuroError::Validation(format!(
            "field 'correo' is not an e-mail address: {value}"
        )));
    }
    Ok(())
}

fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *value = None;
    }
}

impl ToolDirective {
    /// Parse and validate a candidate payload.
    pub fn parse(payload: &str) -> NeuroResult<Self> {
        let mut directive: ToolDirective = serde_json::from_str(payload.trim())
            .map_err(|e| NeuroError::Validation(format!("invalid directive: {e}")))?;
        directive.validate()?;
        Ok(directive)
    }

    /// Action tag.
    pub fn action(&self) -> &'static str {
        match self {
            ToolDirective::SaveContact(_) => "save_contact",
            ToolDirective::RegisterCourse(_) => "register_course",
            ToolDirective::CreateReport(_) => "create_report",
        }
    }

    fn validate(&mut self) -> NeuroResult<()> {
        match self {
            ToolDirective::SaveContact(d) => {
                require("nombre", &d.nombre)?;
                require_email(&d.correo)?;
                require("interes", &d.interes)?;
                blank_to_none(&mut d.empresa);
                blank_to_none(&mut d.telefono);
                blank_to_none(&mut d.mensaje);
            }
            ToolDirective::RegisterCourse(d) => {
                require("nombre", &d.nombre)?;
                require_email(&d.correo)?;
                require("curso", &d.curso)?;
            }
            ToolDirective::CreateReport(d) => {
                require("tipo", &d.tipo)?;
                require("descripcion", &d.descripcion)?;
                require("ubicacion", &d.ubicacion)?;
            }
        }
        Ok(())
    }
}

fn string_field(description: &str) -> serde_json::Value {
    serde_json::json!({ "type": "string", "description": description })
}

fn variant_schema(
    action: &str,
    properties: serde_json::Value,
    required: &[&str],
) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": { "const": action },
            "data": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false
            }
        },
        "required": ["action", "data"]
    })
}

/// Machine-readable description of every directive variant.
pub fn directive_schema() -> serde_json::Value {
    serde_json::json!({
        "oneOf": [
            variant_schema(
                "save_contact",
                serde_json::json!({
                    "nombre": string_field("Nombre completo del usuario"),
                    "correo": string_field("Correo electrónico"),
                    "interes": string_field("Interés principal"),
                    "empresa": string_field("Empresa (opcional)"),
                    "telefono": string_field("Teléfono (opcional)"),
                    "mensaje": string_field("Mensaje adicional (opcional)"),
                }),
                &["nombre", "correo", "interes"],
            ),
            variant_schema(
                "register_course",
                serde_json::json!({
                    "nombre": string_field("Nombre completo del estudiante"),
                    "correo": string_field("Correo electrónico"),
                    "curso": string_field("Nombre del curso (Python, IA, etc)"),
                }),
                &["nombre", "correo", "curso"],
            ),
            variant_schema(
                "create_report",
                serde_json::json!({
                    "tipo": string_field("Tipo de reporte (bache, alumbrado, basura, etc)"),
                    "descripcion": string_field("Descripción del problema"),
                    "ubicacion": string_field("Ubicación o dirección"),
                }),
                &["tipo", "descripcion", "ubicacion"],
            ),
        ]
    })
}
