use std::sync::Arc;

use tracing::{info, instrument};

use crate::client::{ModelGateway, RequestConfig};
use crate::error::Task;
use crate::paper::{AnalysisResult, ResearchPaper};
use crate::prompt;
use crate::{Error, Result};

/// Clusters a result set into 2 to 4 themes via a schema-constrained call
#[derive(Clone)]
pub struct AnalysisTool {
    gateway: Arc<dyn ModelGateway>,
}

impl AnalysisTool {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    #[instrument(skip_all, fields(papers = papers.len()))]
    pub async fn analyze(&self, papers: &[ResearchPaper]) -> Result<AnalysisResult> {
        if papers.is_empty() {
            return Err(Error::InvalidInput {
                field: "papers".to_string(),
                reason: "Nothing to analyze".to_string(),
            });
        }

        let prompt = prompt::analysis_prompt(papers);
        let config = RequestConfig::with_schema(prompt::analysis_schema());
        let reply = self
            .gateway
            .generate(Task::Analysis, &prompt, &config)
            .await?;

        if reply.text.trim().is_empty() {
            return Err(Error::EmptyResult {
                task: Task::Analysis,
            });
        }

        let result: AnalysisResult = serde_json::from_str(&reply.text)
            .map_err(|e| Error::parsing(Task::Analysis, e.to_string()))?;

        info!(clusters = result.clusters.len(), "analysis completed");
        Ok(result)
    }
}
