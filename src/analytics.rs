use tracing::info;
use uuid::Uuid;

use crate::error::Task;

/// Usage event recorded at an action boundary
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    SearchCompleted {
        query: &'a str,
        paper_count: usize,
        from_cache: bool,
    },
    AnalysisCompleted {
        cluster_count: usize,
    },
    CitationsGenerated {
        citation_count: usize,
    },
    ConnectedPapersFound {
        paper_count: usize,
    },
    PdfResolved {
        found: bool,
    },
    ChatMessageSent {
        reply_chars: usize,
    },
    ActionFailed {
        task: Task,
        kind: &'static str,
    },
}

/// Session-scoped usage recorder.
///
/// Constructed once at startup and passed by reference; the session id is
/// generated at construction and never changes. Events go to the log stream
/// under the `analytics` target rather than to any external service.
#[derive(Debug, Clone)]
pub struct Analytics {
    session_id: Uuid,
}

impl Analytics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record(&self, event: &Event<'_>) {
        match *event {
            Event::SearchCompleted {
                query,
                paper_count,
                from_cache,
            } => {
                info!(
                    target: "analytics",
                    session = %self.session_id,
                    event = "search_completed",
                    query,
                    paper_count,
                    from_cache,
                );
            }
            Event::AnalysisCompleted { cluster_count } => {
                info!(
                    target: "analytics",
                    session = %self.session_id,
                    event = "analysis_completed",
                    cluster_count,
                );
            }
            Event::CitationsGenerated { citation_count } => {
                info!(
                    target: "analytics",
                    session = %self.session_id,
                    event = "citations_generated",
                    citation_count,
                );
            }
            Event::ConnectedPapersFound { paper_count } => {
                info!(
                    target: "analytics",
                    session = %self.session_id,
                    event = "connected_papers_found",
                    paper_count,
                );
            }
            Event::PdfResolved { found } => {
                info!(
                    target: "analytics",
                    session = %self.session_id,
                    event = "pdf_resolved",
                    found,
                );
            }
            Event::ChatMessageSent { reply_chars } => {
                info!(
                    target: "analytics",
                    session = %self.session_id,
                    event = "chat_message_sent",
                    reply_chars,
                );
            }
            Event::ActionFailed { task, kind } => {
                info!(
                    target: "analytics",
                    session = %self.session_id,
                    event = "action_failed",
                    task = %task,
                    kind,
                );
            }
        }
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new()
    }
}
