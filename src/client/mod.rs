pub mod gemini;
pub mod schema;

pub use gemini::GeminiClient;
pub use schema::{ResponseSchema, SchemaType};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Task;
use crate::Result;

/// A web source the model consulted while grounding its answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn of the paper-grounded chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Ordered text fragments; streamed replies accumulate more than one
    pub parts: Vec<String>,
}

impl ChatMessage {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![text.into()],
        }
    }

    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![text.into()],
        }
    }

    /// All fragments joined into the displayed message text
    #[must_use]
    pub fn text(&self) -> String {
        self.parts.concat()
    }
}

/// Per-request options beyond the prompt itself
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Let the model consult web search while answering
    pub web_search: bool,
    /// Constrain the reply to JSON of this shape. Mutually exclusive with
    /// `web_search` on the current API; callers pick one.
    pub response_schema: Option<ResponseSchema>,
    pub system_instruction: Option<String>,
}

impl RequestConfig {
    #[must_use]
    pub fn with_web_search() -> Self {
        Self {
            web_search: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_schema(schema: ResponseSchema) -> Self {
        Self {
            response_schema: Some(schema),
            ..Self::default()
        }
    }
}

/// Reply from a one-shot completion
#[derive(Debug, Clone, Default)]
pub struct GenerateReply {
    pub text: String,
    /// Grounding citations, present only when web search was enabled and
    /// the model actually consulted sources
    pub sources: Vec<GroundingSource>,
}

/// Stream of reply deltas for one chat turn.
///
/// Ends when the sender side completes; a classified error arrives as the
/// final item when the transport fails mid-stream.
pub struct TextStream {
    receiver: mpsc::Receiver<Result<String>>,
}

impl TextStream {
    pub(crate) fn new(receiver: mpsc::Receiver<Result<String>>) -> Self {
        Self { receiver }
    }

    pub async fn next(&mut self) -> Option<Result<String>> {
        self.receiver.recv().await
    }
}

/// The generative completion service, seen from the tools layer.
///
/// Implementations classify their own failures with the caller's task so
/// errors carry context by the time they cross this boundary. The service
/// is non-deterministic and its output format is requested, never
/// guaranteed; callers must tolerate empty or malformed text.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send one prompt and wait for the full reply.
    async fn generate(
        &self,
        task: Task,
        prompt: &str,
        config: &RequestConfig,
    ) -> Result<GenerateReply>;

    /// Send a chat history and stream the model's reply incrementally.
    async fn stream_chat(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
    ) -> Result<TextStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_text_joins_parts() {
        let mut message = ChatMessage::model("Hello");
        message.parts.push(", world".to_string());
        assert_eq!(message.text(), "Hello, world");
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), r#""model""#);
    }
}
