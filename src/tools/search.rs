use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::cache::SearchCache;
use crate::client::{GroundingSource, ModelGateway, RequestConfig};
use crate::error::Task;
use crate::paper::ResearchPaper;
use crate::prompt::{self, SearchRequest};
use crate::{Config, Error, Result};

/// Outcome of one search, fresh or replayed from cache
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub papers: Vec<ResearchPaper>,
    /// Citations attached by an earlier citation pass, when served from cache
    pub citations: Vec<String>,
    /// Web sources the model consulted; empty for cache hits
    pub sources: Vec<GroundingSource>,
    pub from_cache: bool,
    /// Key the result is stored under, used to attach citations later
    pub cache_key: String,
}

/// Primary paper-search tool
#[derive(Clone)]
pub struct SearchTool {
    gateway: Arc<dyn ModelGateway>,
    cache: SearchCache,
    config: Arc<Config>,
}

impl std::fmt::Debug for SearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchTool")
            .field("gateway", &"ModelGateway")
            .field("cache", &"SearchCache")
            .field("config", &"Config")
            .finish()
    }
}

impl SearchTool {
    pub fn new(gateway: Arc<dyn ModelGateway>, cache: SearchCache, config: Arc<Config>) -> Self {
        info!("Initializing paper search tool");
        Self {
            gateway,
            cache,
            config,
        }
    }

    /// Execute a paper search, consulting the cache first.
    ///
    /// A fresh search stores its papers under the request's cache key with
    /// no citations; a later citation pass fills them in. Distinguishes an
    /// entirely empty model reply from a reply no block of which survived
    /// validation, since the user remedy differs.
    #[instrument(skip(self, request), fields(query = %request.query, source = ?request.source))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        Self::validate_request(request)?;

        let cache_key = generate_cache_key(request);
        if let Some(hit) = self.cache.get(&cache_key).await {
            debug!("returning cached result");
            return Ok(SearchOutcome {
                papers: hit.papers,
                citations: hit.citations,
                sources: Vec::new(),
                from_cache: true,
                cache_key,
            });
        }

        let prompt = prompt::search_prompt(request, self.config.search.result_count);
        let reply = self
            .gateway
            .generate(Task::Search, &prompt, &RequestConfig::with_web_search())
            .await?;

        if reply.text.trim().is_empty() {
            return Err(Error::EmptyResult { task: Task::Search });
        }

        let papers = crate::parser::parse_papers(&reply.text);
        if papers.is_empty() {
            return Err(Error::UnparsableResult);
        }

        self.cache
            .put(&cache_key, papers.clone(), Vec::new())
            .await;

        info!(papers = papers.len(), sources = reply.sources.len(), "search completed");
        Ok(SearchOutcome {
            papers,
            citations: Vec::new(),
            sources: reply.sources,
            from_cache: false,
            cache_key,
        })
    }

    fn validate_request(request: &SearchRequest) -> Result<()> {
        if request.query.trim().is_empty() {
            return Err(Error::InvalidInput {
                field: "query".to_string(),
                reason: "Query cannot be empty".to_string(),
            });
        }

        if request.query.len() > 1000 {
            return Err(Error::InvalidInput {
                field: "query".to_string(),
                reason: "Query too long (max 1000 characters)".to_string(),
            });
        }

        if request.query.contains('\0') || request.query.contains('\x1b') {
            return Err(Error::InvalidInput {
                field: "query".to_string(),
                reason: "Query contains invalid characters".to_string(),
            });
        }

        Ok(())
    }
}

/// Compose the cache key from every parameter that shapes the result:
/// normalized query, source, summary length and style, advanced options,
/// and the seed set. Any single difference is a different key.
fn generate_cache_key(request: &SearchRequest) -> String {
    let advanced = request.advanced.key_tokens();
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}",
        request.query.trim().to_lowercase(),
        request.source.key_token(),
        request.summary_length.key_token(),
        request.summary_style.key_token(),
        advanced[0],
        advanced[1],
        advanced[2],
        advanced[3],
        request.seed_titles.join(";"),
    )
}
