use std::sync::Arc;

use tracing::{debug, instrument};

use crate::client::{ChatMessage, ModelGateway};
use crate::error::Task;
use crate::paper::ResearchPaper;
use crate::prompt;
use crate::{Error, Result};

/// Follow-up chat grounded in the current result set.
///
/// The system instruction embeds the retrieved papers' titles and summaries
/// verbatim; `reset` rebuilds it and clears history whenever a new search
/// lands. History is append-only between resets: a user turn is appended
/// before the call, and the model turn is appended only once its reply
/// finished streaming, so a failed stream leaves nothing dangling.
pub struct ChatSession {
    gateway: Arc<dyn ModelGateway>,
    system_instruction: String,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(gateway: Arc<dyn ModelGateway>, papers: &[ResearchPaper]) -> Self {
        Self {
            gateway,
            system_instruction: prompt::chat_system_instruction(papers),
            history: Vec::new(),
        }
    }

    /// Re-seed the conversation from a new result set, dropping history.
    pub fn reset(&mut self, papers: &[ResearchPaper]) {
        self.system_instruction = prompt::chat_system_instruction(papers);
        self.history.clear();
        debug!("chat context reset");
    }

    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Send one user message and stream the reply.
    ///
    /// `on_delta` is invoked for each text fragment in arrival order; the
    /// full reply is returned once the stream completes. Taking `&mut self`
    /// means a second send cannot start while one is in flight.
    #[instrument(skip_all, fields(turns = self.history.len()))]
    pub async fn send<F>(&mut self, message: &str, mut on_delta: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        if message.trim().is_empty() {
            return Err(Error::InvalidInput {
                field: "message".to_string(),
                reason: "Message cannot be empty".to_string(),
            });
        }

        self.history.push(ChatMessage::user(message));

        let mut stream = self
            .gateway
            .stream_chat(&self.system_instruction, &self.history)
            .await?;

        let mut accumulated = String::new();
        while let Some(delta) = stream.next().await {
            let delta = delta?;
            on_delta(&delta);
            accumulated.push_str(&delta);
        }

        if accumulated.is_empty() {
            return Err(Error::EmptyResult { task: Task::Chat });
        }

        self.history.push(ChatMessage::model(accumulated.clone()));
        Ok(accumulated)
    }
}
