use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::client::{ModelGateway, RequestConfig};
use crate::error::Task;
use crate::paper::ResearchPaper;
use crate::{parser, prompt, Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PdfReply {
    pdf_url: String,
}

/// Best-effort lookup of a direct PDF link for one paper.
///
/// This task needs web search, which the API will not combine with an
/// enforced response schema, so the reply is plain text the model was asked
/// to keep to a single JSON object. Extraction is correspondingly lenient,
/// and like suggestions, every failure degrades to "not found".
#[derive(Clone)]
pub struct PdfLinkTool {
    gateway: Arc<dyn ModelGateway>,
}

impl PdfLinkTool {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    #[instrument(skip_all, fields(paper = %paper.title))]
    pub async fn find(&self, paper: &ResearchPaper) -> Option<String> {
        match self.lookup(paper).await {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "pdf lookup degraded to not-found");
                None
            }
        }
    }

    async fn lookup(&self, paper: &ResearchPaper) -> Result<Option<String>> {
        let prompt = prompt::pdf_prompt(paper);
        let reply = self
            .gateway
            .generate(Task::PdfLookup, &prompt, &RequestConfig::with_web_search())
            .await?;

        let json = parser::extract_json_object(&reply.text)
            .ok_or_else(|| Error::parsing(Task::PdfLookup, "no JSON object in reply"))?;
        let parsed: PdfReply = serde_json::from_str(json)
            .map_err(|e| Error::parsing(Task::PdfLookup, e.to_string()))?;

        let url = parsed.pdf_url.trim();
        if url.is_empty() {
            return Ok(None);
        }

        // The model occasionally answers with prose or a bare domain;
        // accept only an absolute http(s) URL
        match Url::parse(url) {
            Ok(parsed_url) if matches!(parsed_url.scheme(), "http" | "https") => {
                Ok(Some(url.to_string()))
            }
            _ => Ok(None),
        }
    }
}
