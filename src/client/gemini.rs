use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::client::{
    ChatMessage, GenerateReply, GroundingSource, ModelGateway, RequestConfig, ResponseSchema,
    Role, TextStream,
};
use crate::config::{Config, Credentials};
use crate::error::Task;
use crate::{Error, Result};

/// How much failure body text is kept for classification and logs
const BODY_EXCERPT_CHARS: usize = 300;

/// Client for the generative language API.
///
/// Non-streaming calls go to `:generateContent`; chat goes to
/// `:streamGenerateContent` with SSE framing. Failures are classified from
/// the response text since the service reports many conditions, rate
/// limiting included, only in the body.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(config: &Config, credentials: &Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            base_url: config.gateway.base_url.trim_end_matches('/').to_string(),
            model: config.gateway.model.clone(),
            api_key: credentials.gemini_api_key.clone(),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    fn build_request(prompt: &str, config: &RequestConfig) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![WireContent::user(prompt)],
            system_instruction: config
                .system_instruction
                .as_deref()
                .map(WireContent::unattributed),
            tools: config.web_search.then(|| {
                vec![WireTool {
                    google_search: WireGoogleSearch {},
                }]
            }),
            generation_config: config.response_schema.clone().map(|schema| {
                WireGenerationConfig {
                    response_mime_type: Some("application/json".to_string()),
                    response_schema: Some(schema),
                }
            }),
        }
    }

    fn build_chat_request(
        system_instruction: &str,
        history: &[ChatMessage],
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: history.iter().map(WireContent::from_message).collect(),
            system_instruction: Some(WireContent::unattributed(system_instruction)),
            tools: None,
            generation_config: None,
        }
    }
}

#[async_trait]
impl ModelGateway for GeminiClient {
    #[instrument(skip(self, prompt, config), fields(task = %task, model = %self.model))]
    async fn generate(
        &self,
        task: Task,
        prompt: &str,
        config: &RequestConfig,
    ) -> Result<GenerateReply> {
        let request = Self::build_request(prompt, config);

        let response = self
            .http
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::classify(task, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::classify(task, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::classify(
                task,
                format!("HTTP {status}: {}", excerpt(&body)),
            ));
        }

        let reply: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| Error::classify(task, format!("malformed response envelope: {e}")))?;

        let (text, sources) = reply.into_text_and_sources();
        debug!(chars = text.len(), sources = sources.len(), "reply received");
        Ok(GenerateReply { text, sources })
    }

    #[instrument(skip_all, fields(model = %self.model, turns = history.len()))]
    async fn stream_chat(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
    ) -> Result<TextStream> {
        let request = Self::build_chat_request(system_instruction, history);

        let response = self
            .http
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::classify(Task::Chat, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::classify(
                Task::Chat,
                format!("HTTP {status}: {}", excerpt(&body)),
            ));
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(forward_sse(response, tx));
        Ok(TextStream::new(rx))
    }
}

/// Read the SSE body line by line and forward text deltas.
///
/// Chunk boundaries do not align with line boundaries, so bytes are
/// buffered until a full line is available. The channel closes when the
/// body ends or the receiver goes away.
async fn forward_sse(response: reqwest::Response, tx: mpsc::Sender<Result<String>>) {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                buffer.extend_from_slice(&bytes);
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    if let Some(delta) = parse_sse_line(line.trim_end()) {
                        if tx.send(Ok(delta)).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("chat stream interrupted: {e}");
                let _ = tx
                    .send(Err(Error::classify(Task::Chat, e.to_string())))
                    .await;
                return;
            }
        }
    }
}

/// Extract the text delta from one SSE line, if it carries one.
fn parse_sse_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    let response: GenerateContentResponse = serde_json::from_str(data).ok()?;
    let (text, _) = response.into_text_and_sources();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

impl WireContent {
    fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![WirePart {
                text: text.to_string(),
            }],
        }
    }

    /// System instructions carry no role on the wire
    fn unattributed(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![WirePart {
                text: text.to_string(),
            }],
        }
    }

    fn from_message(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: message
                .parts
                .iter()
                .map(|text| WirePart { text: text.clone() })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct WirePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    google_search: WireGoogleSearch,
}

#[derive(Debug, Serialize)]
struct WireGoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<ResponseSchema>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GenerateContentResponse {
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireCandidate {
    content: Option<WireContent>,
    grounding_metadata: Option<WireGroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireGroundingMetadata {
    grounding_chunks: Vec<WireGroundingChunk>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WireGroundingChunk {
    web: Option<WireWebSource>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WireWebSource {
    uri: Option<String>,
    title: Option<String>,
}

impl GenerateContentResponse {
    /// Join the first candidate's text parts and keep only grounding
    /// chunks that carry both a URI and a title.
    fn into_text_and_sources(self) -> (String, Vec<GroundingSource>) {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return (String::new(), Vec::new());
        };

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let sources = candidate
            .grounding_metadata
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .filter_map(|web| match (web.uri, web.title) {
                        (Some(uri), Some(title)) => Some(GroundingSource { uri, title }),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        (text, sources)
    }
}
