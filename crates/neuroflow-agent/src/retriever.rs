use async_trait::async_trait;
use neuroflow_core::{NeuroError, NeuroResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Topic of the items returned when nothing matches.
pub const FALLBACK_TOPIC: &str = "Identidad";

/// Words shorter than this are ignored as individual search terms.
const MIN_TERM_CHARS: usize = 4;

/// One entry of the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub topic: String,
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl KnowledgeItem {
    pub fn new(topic: impl Into<String>, content: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

/// Query → ranked snippets capability.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Return at most `limit` snippets, most relevant first.
    async fn retrieve(&self, query: &str, limit: usize) -> NeuroResult<Vec<String>>;
}

/// Case-insensitive keyword lookup over an in-memory knowledge base.
///
/// The whole query and each of its longer words are matched as substrings
/// of item content and keywords. Items are ranked by how many terms hit;
/// a whole-query hit outranks any number of word hits.
#[derive(Debug, Default)]
pub struct KeywordRetriever {
    items: Vec<KnowledgeItem>,
    /// Lowercased `content + keywords`, parallel to `items`.
    haystacks: Vec<String>,
}

impl KeywordRetriever {
    pub fn new(items: Vec<KnowledgeItem>) -> Self {
        let haystacks = items
            .iter()
            .map(|i| format!("{} {}", i.content, i.keywords.join(" ")).to_lowercase())
            .collect();
        Self { items, haystacks }
    }

    /// Load a JSON array of [`KnowledgeItem`]s.
    pub fn from_json_file(path: impl AsRef<Path>) -> NeuroResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            NeuroError::Config(format!("knowledge file {}: {e}", path.display()))
        })?;
        let items: Vec<KnowledgeItem> = serde_json::from_str(&raw)?;
        Ok(Self::new(items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn score(&self, haystack: &str, query: &str, terms: &[String]) -> usize {
        let whole = if !query.is_empty() && haystack.contains(query) {
            terms.len() + 1
        } else {
            0
        };
        whole + terms.iter().filter(|t| haystack.contains(t.as_str())).count()
    }
}

#[async_trait]
impl ContextRetriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, limit: usize) -> NeuroResult<Vec<String>> {
        let query = query.trim().to_lowercase();
        let terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= MIN_TERM_CHARS)
            .map(str::to_string)
            .collect();

        let mut ranked: Vec<(usize, usize)> = self
            .haystacks
            .iter()
            .enumerate()
            .map(|(idx, h)| (idx, self.score(h, &query, &terms)))
            .filter(|(_, score)| *score > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        if ranked.is_empty() {
            return Ok(self
                .items
                .iter()
                .filter(|i| i.topic == FALLBACK_TOPIC)
                .take(limit.min(1))
                .map(|i| i.content.clone())
                .collect());
        }

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(idx, _)| self.items[idx].content.clone())
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn retriever() -> KeywordRetriever {
        KeywordRetriever::new(vec![
            KnowledgeItem::new(
                "Identidad",
                "El CIAY es el centro de innovación del estado.",
                &["ciay", "centro"],
            ),
            KnowledgeItem::new(
                "Inversión",
                "Ofrecemos incentivos fiscales para inversionistas.",
                &["capital", "invertir", "incentivos"],
            ),
            KnowledgeItem::new(
                "Educación",
                "Cursos de Python e inteligencia artificial.",
                &["curso", "python", "capital humano"],
            ),
        ])
    }

    #[tokio::test]
    async fn test_keyword_ranking() {
        let r = retriever();
        let hits = r.retrieve("Quiero invertir capital", 3).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].contains("incentivos"));
    }

    #[tokio::test]
    async fn test_case_insensitive_whole_query() {
        let r = retriever();
        let hits = r.retrieve("PYTHON", 3).await.unwrap();
        assert_eq!(hits, vec!["Cursos de Python e inteligencia artificial.".to_string()]);
    }

    #[tokio::test]
    async fn test_limit_is_respected() {
        let r = retriever();
        assert_eq!(r.retrieve("capital", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_match_falls_back_to_identity() {
        let r = retriever();
        let hits = r.retrieve("xyz", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("CIAY"));
    }

    #[tokio::test]
    async fn test_empty_base_returns_nothing() {
        let r = KeywordRetriever::default();
        assert!(r.retrieve("hola", 3).await.unwrap().is_empty());
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.json");
        std::fs::write(
            &path,
            r#"[{"topic":"Identidad","content":"Somos el CIAY."}]"#,
        )
        .unwrap();
        let r = KeywordRetriever::from_json_file(&path).unwrap();
        assert_eq!(r.len(), 1);
        assert!(KeywordRetriever::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
