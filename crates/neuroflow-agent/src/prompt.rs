use crate::directive::{directive_schema, CLOSE_DELIMITER, OPEN_DELIMITER};
use neuroflow_core::{Intent, NeuroError, NeuroResult};
use std::path::Path;

/// Persona used when none is configured.
pub const DEFAULT_PERSONA: &str = "Eres el asistente del CIAY.";

/// Context line used when retrieval returns nothing.
pub const FALLBACK_CONTEXT: &str =
    "- Sin contexto específico disponible; responde con información general del CIAY.";

/// Whether directive instructions are injected for this intent.
pub fn allows_directives(intent: Intent) -> bool {
    matches!(
        intent,
        Intent::Contacto
            | Intent::Inversionista
            | Intent::Estudiante
            | Intent::Startup
            | Intent::Ciudadano
    )
}

/// Builds the system prompt for a generation call.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    persona: String,
    directive_block: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA)
    }
}

impl PromptComposer {
    pub fn new(persona: impl Into<String>) -> Self {
        let schema = serde_json::to_string_pretty(&directive_schema()).unwrap_or_default();
        let directive_block = format!(
            "IMPORTANTE: Si tienes los datos necesarios para ejecutar una acción, \
genera un único bloque JSON al final de tu respuesta.\n\
Usa ESTRICTAMENTE este esquema para estructurarlo:\n{schema}\n\n\
Envuelve el JSON en marcadores así:\n{OPEN_DELIMITER} <JSON_AQUI> {CLOSE_DELIMITER}\n\
No escribas nada después del marcador de cierre."
        );
        Self {
            persona: persona.into(),
            directive_block,
        }
    }

    /// Read the persona from a text file.
    pub fn from_file(path: impl AsRef<Path>) -> NeuroResult<Self> {
        let path = path.as_ref();
        let persona = std::fs::read_to_string(path)
            .map_err(|e| NeuroError::Config(format!("persona file {}: {e}", path.display())))?;
        Ok(Self::new(persona.trim()))
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Persona + retrieved context + directive schema when the intent is
    /// allow-listed.
    pub fn compose(&self, intent: Intent, context: &[String]) -> String {
        let context_text = if context.is_empty() {
            FALLBACK_CONTEXT.to_string()
        } else {
            context
                .iter()
                .map(|c| format!("- {c}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut prompt = format!("{}\n\nCONTEXTO:\n{context_text}", self.persona);
        if allows_directives(intent) {
            prompt.push_str("\n\n");
            prompt.push_str(&self.directive_block);
        }
        prompt
    }
}
