use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::cache::SearchCache;
use crate::client::{ModelGateway, RequestConfig};
use crate::error::Task;
use crate::paper::ResearchPaper;
use crate::prompt;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct CitationReply {
    citations: Vec<String>,
}

/// Generates formatted citations and attaches them to the cached search
#[derive(Clone)]
pub struct CitationTool {
    gateway: Arc<dyn ModelGateway>,
    cache: SearchCache,
}

impl CitationTool {
    pub fn new(gateway: Arc<dyn ModelGateway>, cache: SearchCache) -> Self {
        Self { gateway, cache }
    }

    /// One citation per paper, in paper order. On success the citations are
    /// written back to the cache entry at `cache_key`, so a repeat of the
    /// same search replays them without another model call.
    #[instrument(skip_all, fields(papers = papers.len()))]
    pub async fn generate(
        &self,
        papers: &[ResearchPaper],
        cache_key: &str,
    ) -> Result<Vec<String>> {
        if papers.is_empty() {
            return Err(Error::InvalidInput {
                field: "papers".to_string(),
                reason: "Nothing to cite".to_string(),
            });
        }

        let prompt = prompt::citations_prompt(papers);
        let config = RequestConfig::with_schema(prompt::citations_schema());
        let reply = self
            .gateway
            .generate(Task::Citations, &prompt, &config)
            .await?;

        if reply.text.trim().is_empty() {
            return Err(Error::EmptyResult {
                task: Task::Citations,
            });
        }

        let parsed: CitationReply = serde_json::from_str(&reply.text)
            .map_err(|e| Error::parsing(Task::Citations, e.to_string()))?;

        self.cache
            .update_citations(cache_key, &parsed.citations)
            .await;

        info!(citations = parsed.citations.len(), "citations generated");
        Ok(parsed.citations)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::tools::testing::FakeGateway;

    fn paper(title: &str) -> ResearchPaper {
        ResearchPaper {
            title: title.to_string(),
            authors: "Doe, J.".to_string(),
            year: "2019".to_string(),
            summary: "s".to_string(),
            source_url: None,
        }
    }

    #[tokio::test]
    async fn test_citations_written_back_to_cache() {
        let cache = SearchCache::new(Duration::from_secs(300));
        cache.put("key", vec![paper("A")], Vec::new()).await;

        let reply = r#"{"citations":["<p>Doe, J. (2019). <a href=\"https://example.org\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"citation-link\">A</a>.</p>"]}"#;
        let tool = CitationTool::new(Arc::new(FakeGateway::with_text(reply)), cache.clone());

        let citations = tool.generate(&[paper("A")], "key").await.unwrap();
        assert_eq!(citations.len(), 1);

        let hit = cache.get("key").await.unwrap();
        assert_eq!(hit.citations, citations);
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_parsing_error() {
        let cache = SearchCache::new(Duration::from_secs(300));
        let tool = CitationTool::new(
            Arc::new(FakeGateway::with_text("citations: none")),
            cache,
        );
        let err = tool.generate(&[paper("A")], "key").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Parsing {
                task: Task::Citations,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_prompt_lists_papers_in_order() {
        let cache = SearchCache::new(Duration::from_secs(300));
        let gateway = Arc::new(FakeGateway::with_text(r#"{"citations":["a","b"]}"#));
        let tool = CitationTool::new(gateway.clone(), cache);

        tool.generate(&[paper("First"), paper("Second")], "key")
            .await
            .unwrap();

        let prompt = gateway.last_prompt().unwrap();
        let first = prompt.find("Title: First").unwrap();
        let second = prompt.find("Title: Second").unwrap();
        assert!(first < second);
    }
}
