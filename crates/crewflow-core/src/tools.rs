use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CrewflowError;
use crate::search::{SearchClient, SearchHit, format_deep_results};

/// Display name of the simple search adapter.
pub const WEB_SEARCH: &str = "Web Search";
/// Display name of the deep search adapter.
pub const DEEP_SEARCH: &str = "Deep Search";

const MAX_RESULTS: usize = 5;

/// A stateless tool an agent can invoke with a single query string.
#[async_trait]
pub trait SearchTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, query: &str) -> anyhow::Result<String>;
}

pub type DynSearchTool = Arc<dyn SearchTool>;

/// Name-to-tool mapping the agent factory resolves config references against.
pub type ToolRegistry = HashMap<String, DynSearchTool>;

/// Build the default registry with both adapters over one shared client.
///
/// Constructed fresh per agent-creation pass; the adapters own no other
/// state.
pub fn default_tool_registry() -> Result<ToolRegistry, CrewflowError> {
    let client = Arc::new(SearchClient::new()?);

    let mut registry = ToolRegistry::new();
    registry.insert(
        WEB_SEARCH.to_string(),
        Arc::new(WebSearchTool::new(client.clone())) as DynSearchTool,
    );
    registry.insert(
        DEEP_SEARCH.to_string(),
        Arc::new(DeepSearchTool::new(client)) as DynSearchTool,
    );
    Ok(registry)
}

/// Simple variant: forwards the query and returns one blob of snippet text.
pub struct WebSearchTool {
    client: Arc<SearchClient>,
}

impl WebSearchTool {
    pub fn new(client: Arc<SearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchTool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for current information on a topic. \
         Input should be a specific search query."
    }

    async fn call(&self, query: &str) -> anyhow::Result<String> {
        let hits = self.client.search(query, MAX_RESULTS).await?;
        let blob = snippet_blob(&hits);
        if blob.is_empty() {
            return Ok(no_results(query));
        }
        Ok(blob)
    }
}

/// Deep variant: returns up to five formatted result entries.
pub struct DeepSearchTool {
    client: Arc<SearchClient>,
}

impl DeepSearchTool {
    pub fn new(client: Arc<SearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchTool for DeepSearchTool {
    fn name(&self) -> &str {
        DEEP_SEARCH
    }

    fn description(&self) -> &str {
        "Perform a thorough web search returning multiple detailed results. \
         Input should be a specific search query."
    }

    async fn call(&self, query: &str) -> anyhow::Result<String> {
        let hits = self.client.search(query, MAX_RESULTS).await?;
        if hits.is_empty() {
            return Ok(no_results(query));
        }
        Ok(format_deep_results(&hits))
    }
}

/// Canned-response tool for tests and offline runs.
pub struct StaticSearchTool {
    name: String,
    response: String,
}

impl StaticSearchTool {
    pub fn new(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: response.into(),
        }
    }
}

#[async_trait]
impl SearchTool for StaticSearchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns a canned response regardless of the query."
    }

    async fn call(&self, _query: &str) -> anyhow::Result<String> {
        Ok(self.response.clone())
    }
}

fn snippet_blob(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.snippet.as_str())
        .filter(|snippet| !snippet.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn no_results(query: &str) -> String {
    format!("No search results found for: {query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(snippet: &str) -> SearchHit {
        SearchHit {
            title: "t".into(),
            url: "https://example.com".into(),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn blob_joins_non_empty_snippets() {
        let hits = vec![hit("alpha"), hit(""), hit("beta")];
        assert_eq!(snippet_blob(&hits), "alpha beta");
        assert_eq!(snippet_blob(&[]), "");
    }

    #[test]
    fn no_results_names_the_query() {
        assert_eq!(
            no_results("quantum computing"),
            "No search results found for: quantum computing"
        );
    }
}
