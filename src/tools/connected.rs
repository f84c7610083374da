use std::sync::Arc;

use tracing::{info, instrument};

use crate::client::{ModelGateway, RequestConfig};
use crate::error::Task;
use crate::paper::{ConnectedPaper, ResearchPaper};
use crate::prompt;
use crate::{Error, Result};

/// Finds papers related to one seed paper through citations, shared
/// methods, or co-citation, using the same delimited reply format as the
/// primary search plus a Connection field.
#[derive(Clone)]
pub struct ConnectedPapersTool {
    gateway: Arc<dyn ModelGateway>,
}

impl ConnectedPapersTool {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    #[instrument(skip_all, fields(seed = %seed.title))]
    pub async fn find(&self, seed: &ResearchPaper) -> Result<Vec<ConnectedPaper>> {
        let prompt = prompt::connected_prompt(seed);
        let reply = self
            .gateway
            .generate(
                Task::ConnectedPapers,
                &prompt,
                &RequestConfig::with_web_search(),
            )
            .await?;

        if reply.text.trim().is_empty() {
            return Err(Error::EmptyResult {
                task: Task::ConnectedPapers,
            });
        }

        let connected = crate::parser::parse_connected_papers(&reply.text);
        if connected.is_empty() {
            // Text came back but no block survived; for this task both
            // conditions mean the same thing to the user
            return Err(Error::EmptyResult {
                task: Task::ConnectedPapers,
            });
        }

        info!(papers = connected.len(), "connected papers found");
        Ok(connected)
    }
}
