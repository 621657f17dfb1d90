use crate::backends::{LlmBackend, ResponseFormat};
use async_trait::async_trait;
use neuroflow_core::{Message, NeuroResult};
use neuroflow_graph::{CandidateExtractor, Candidates};
use std::sync::Arc;

const EXTRACTION_PROMPT: &str = "Extrae conceptos clave de la conversación para un grafo de \
conocimiento. Responde solo JSON con la forma \
{\"nodes\": [{\"id\": \"Concepto\", \"group\": \"concept\"}], \
\"edges\": [{\"source\": \"Concepto\", \"target\": \"Otro\", \"relation\": \"relacion\"}]}. \
Usa ids cortos (máximo 40 caracteres). Puedes enlazar con los nodos existentes \
CIAY, Educación, Inversión, Gobierno y Startups.";

/// Candidate extractor backed by a JSON-mode completion.
pub struct LlmCandidateExtractor {
    backend: Arc<dyn LlmBackend>,
}

impl LlmCandidateExtractor {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl CandidateExtractor for LlmCandidateExtractor {
    async fn extract(&self, user_input: &str, bot_response: &str) -> NeuroResult<Candidates> {
        let exchange = format!("Usuario: {user_input}\nAsistente: {bot_response}");
        let reply = self
            .backend
            .complete(
                Some(EXTRACTION_PROMPT),
                &[Message::user(exchange)],
                ResponseFormat::Json,
            )
            .await?;
        Ok(serde_json::from_str(reply.trim())?)
    }
}
