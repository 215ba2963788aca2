//! Document retrieval
//!
//! Loading, splitting and embedding documents is left to the application;
//! the graph only needs something that answers a query with ranked passages.
//! [`KeywordRetriever`] ranks by term overlap, which is enough for demos and
//! tests, and [`RetrieverTool`] exposes any retriever to a model as a tool.

use crate::error::{AgentError, Result};
use crate::tools::{Tool, ToolOutput};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// A retrieved chunk of text and its relevance (higher is better)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub score: f64,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Passages relevant to `query`, best first
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>>;
}

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

fn terms(text: &str) -> HashSet<String> {
    WORD_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// In-memory retriever scoring documents by the fraction of query terms
/// they contain
///
/// ```rust
/// use flowstate_prebuilt::{KeywordRetriever, Retriever};
///
/// # #[tokio::main]
/// # async fn main() -> flowstate_prebuilt::Result<()> {
/// let retriever = KeywordRetriever::from_text(
///     "Refunds are issued within 14 days.\n\nPets are not allowed in the cabin.",
/// );
/// let passages = retriever.retrieve("how many days for a refund").await?;
/// assert!(passages[0].text.starts_with("Refunds"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KeywordRetriever {
    documents: Vec<(String, HashSet<String>)>,
    top_k: usize,
}

impl KeywordRetriever {
    pub fn new<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents = documents
            .into_iter()
            .map(Into::into)
            .map(|text: String| {
                let words = terms(&text);
                (text, words)
            })
            .collect();
        Self { documents, top_k: 2 }
    }

    /// One document per blank-line separated paragraph
    pub fn from_text(text: &str) -> Self {
        Self::new(
            text.split("\n\n")
                .map(str::trim)
                .filter(|paragraph| !paragraph.is_empty()),
        )
    }

    /// Maximum number of passages returned (default 2)
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut passages: Vec<Passage> = self
            .documents
            .iter()
            .filter_map(|(text, words)| {
                let hits = query_terms.intersection(words).count();
                (hits > 0).then(|| Passage {
                    text: text.clone(),
                    score: hits as f64 / query_terms.len() as f64,
                })
            })
            .collect();

        // stable sort keeps document order among equal scores
        passages.sort_by(|a, b| b.score.total_cmp(&a.score));
        passages.truncate(self.top_k);

        tracing::debug!(query, hits = passages.len(), "Keyword retrieval");
        Ok(passages)
    }
}

/// Tool wrapping a [`Retriever`]; the output is the passage texts joined by
/// blank lines
pub struct RetrieverTool {
    name: String,
    description: String,
    retriever: Arc<dyn Retriever>,
}

impl RetrieverTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            retriever,
        }
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::invalid_arguments(&self.name, "missing field 'query'"))?;

        let passages = self.retriever.retrieve(query).await?;
        let joined = passages
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Value::String(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "Flights can be changed up to 24 hours before departure.\n\n\
        Refunds for cancelled flights are issued within 14 days.\n\n\
        Hotel bookings are refundable until check-in day.";

    #[tokio::test]
    async fn test_ranks_by_overlap() {
        let retriever = KeywordRetriever::from_text(POLICY).with_top_k(3);
        assert_eq!(retriever.len(), 3);

        let passages = retriever.retrieve("cancelled flights refunds").await.unwrap();
        assert_eq!(passages.len(), 2);
        assert!(passages[0].text.starts_with("Refunds"));
        assert!((passages[0].score - 1.0).abs() < f64::EPSILON);
        assert!(passages[1].text.starts_with("Flights"));
    }

    #[tokio::test]
    async fn test_no_terms_no_passages() {
        let retriever = KeywordRetriever::from_text(POLICY);
        assert!(retriever.retrieve("   ?! ").await.unwrap().is_empty());
        assert!(retriever.retrieve("spaceship").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_joins_passages() {
        let retriever = Arc::new(KeywordRetriever::from_text(POLICY));
        let tool = RetrieverTool::new("lookup_policy", "Consult the company policies", retriever);

        let output = tool.invoke(json!({"query": "flights"})).await.unwrap();
        assert_eq!(
            output,
            json!("Flights can be changed up to 24 hours before departure.\n\nRefunds for cancelled flights are issued within 14 days.")
        );
        assert_eq!(tool.spec().parameters["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn test_tool_requires_query() {
        let tool = RetrieverTool::new("lookup_policy", "", Arc::new(KeywordRetriever::new(Vec::<String>::new())));
        assert!(matches!(
            tool.invoke(json!({})).await,
            Err(AgentError::InvalidToolArguments { .. })
        ));
    }
}
