use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::client::{ModelGateway, RequestConfig};
use crate::error::Task;
use crate::prompt;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct SuggestionReply {
    suggestions: Vec<String>,
}

/// Best-effort related-query suggestions.
///
/// This is a non-essential enhancement: every failure degrades to an empty
/// list and nothing is surfaced to the user. Queries shorter than the
/// configured minimum never reach the gateway at all.
#[derive(Clone)]
pub struct SuggestionTool {
    gateway: Arc<dyn ModelGateway>,
    min_query_len: usize,
}

impl SuggestionTool {
    pub fn new(gateway: Arc<dyn ModelGateway>, min_query_len: usize) -> Self {
        Self {
            gateway,
            min_query_len,
        }
    }

    #[instrument(skip(self))]
    pub async fn suggest(&self, query: &str) -> Vec<String> {
        let trimmed = query.trim();
        if trimmed.chars().count() < self.min_query_len {
            return Vec::new();
        }

        match self.fetch(trimmed).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                debug!(error = %e, "suggestions degraded to empty");
                Vec::new()
            }
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<String>> {
        let prompt = prompt::suggestions_prompt(query);
        let config = RequestConfig::with_schema(prompt::suggestions_schema());
        let reply = self
            .gateway
            .generate(Task::Suggestions, &prompt, &config)
            .await?;

        if reply.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parsed: SuggestionReply = serde_json::from_str(&reply.text)
            .map_err(|e| Error::parsing(Task::Suggestions, e.to_string()))?;
        Ok(parsed.suggestions)
    }
}

/// Handed to a debounced action; lets it check whether it has been
/// superseded before applying its result.
pub struct DebounceGuard {
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl DebounceGuard {
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

/// Keystroke coalescing for suggestion fetches.
///
/// Each `schedule` call supersedes the pending one: when a timer expires it
/// first checks that nothing newer was scheduled, so only the last action
/// in a burst runs. `cancel` stales everything outstanding, timers and
/// fetches already in flight alike, for when the user submits a search or
/// picks a suggestion. Nothing is ever aborted; superseded work simply
/// finds its guard stale and does not apply its result.
#[derive(Clone)]
pub struct SuggestionDebouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl SuggestionDebouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn schedule<F, Fut>(&self, action: F)
    where
        F: FnOnce(DebounceGuard) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = DebounceGuard {
            generation,
            counter: Arc::clone(&self.generation),
        };
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if guard.is_current() {
                action(guard).await;
            }
        });
    }

    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
