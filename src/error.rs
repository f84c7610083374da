use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::error;

lazy_static! {
    /// Standalone three-digit 5xx status embedded in failure text.
    static ref SERVER_STATUS: Regex = Regex::new(r"\b5\d{2}\b").expect("valid 5xx pattern");
}

/// The model-backed task a failure belongs to.
///
/// Carried by every classified error so logs and user-facing messages
/// can name the action that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Search,
    Analysis,
    Citations,
    ConnectedPapers,
    Suggestions,
    PdfLookup,
    Chat,
}

impl Task {
    /// Human-readable task description used in user-facing messages.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Search => "paper search",
            Self::Analysis => "cluster analysis",
            Self::Citations => "citation generation",
            Self::ConnectedPapers => "connected-papers lookup",
            Self::Suggestions => "search suggestions",
            Self::PdfLookup => "PDF lookup",
            Self::Chat => "chat",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Error taxonomy for the assistant core
#[derive(Error, Debug)]
pub enum Error {
    // Gateway failures, classified from failure text
    #[error("Rate limit exceeded during {task}: {message}")]
    RateLimit { task: Task, message: String },

    #[error("Upstream server error during {task}: {message}")]
    Server { task: Task, message: String },

    #[error("API error during {task}: {message}")]
    Api { task: Task, message: String },

    // Structured-output responses that failed to parse as JSON
    #[error("Parse error in {task} response: {message}")]
    Parsing { task: Task, message: String },

    // The model answered, but with nothing usable
    #[error("Empty model response for {task}")]
    EmptyResult { task: Task },

    // Text came back, but zero blocks survived field validation
    #[error("No parsable paper entries in model response")]
    UnparsableResult,

    // Client errors (caller mistakes, no gateway involved)
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    // Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // HTTP client construction failures, before any task context exists
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Classify a gateway failure from its message text.
    ///
    /// No structured status is guaranteed by the gateway, so classification
    /// pattern-matches on the text: "429"/"rate limit" before a 5xx marker
    /// before the generic API error. The classified error is logged with its
    /// task before being returned; retrying is the caller's decision.
    pub fn classify(task: Task, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();

        let classified = if message.contains("429") || lowered.contains("rate limit") {
            Self::RateLimit { task, message }
        } else if SERVER_STATUS.is_match(&message) || lowered.contains("server error") {
            Self::Server { task, message }
        } else {
            Self::Api { task, message }
        };

        error!(task = %task, kind = classified.kind(), "{}", classified);
        classified
    }

    /// Build a parsing error for a structured-output response, logged like
    /// classified gateway failures.
    pub fn parsing(task: Task, message: impl Into<String>) -> Self {
        let err = Self::Parsing {
            task,
            message: message.into(),
        };
        error!(task = %task, kind = err.kind(), "{}", err);
        err
    }

    /// Short machine-readable label for logging and analytics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RateLimit { .. } => "rate_limit",
            Self::Server { .. } => "server_error",
            Self::Api { .. } => "api_error",
            Self::Parsing { .. } => "parsing_error",
            Self::EmptyResult { .. } => "empty_result",
            Self::UnparsableResult => "unparsable_result",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Config(_) => "config_error",
            Self::Env(_) => "env_error",
            Self::Toml(_) => "toml_error",
            Self::Http(_) => "http_error",
        }
    }

    /// The message shown to the user at the action boundary.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimit { task, .. } => format!(
                "The model is rate limiting requests. Wait a moment before retrying the {task}."
            ),
            Self::Server { task, .. } => format!(
                "The model service hit a server-side problem during the {task}. Try again shortly."
            ),
            Self::Api { task, message } => format!("The {task} failed: {message}"),
            Self::Parsing { task, .. } => {
                format!("The model's {task} response was not in the expected format.")
            }
            Self::EmptyResult { task: Task::Search } => {
                "The model returned no text for this search. Try rephrasing the query.".to_string()
            }
            Self::EmptyResult {
                task: Task::ConnectedPapers,
            } => "The model could not identify papers connected to this one.".to_string(),
            Self::EmptyResult { task } => format!("The model returned nothing for the {task}."),
            Self::UnparsableResult => {
                "The model's reply did not contain any readable paper entries. Try the search again."
                    .to_string()
            }
            Self::InvalidInput { field, reason } => format!("Invalid {field}: {reason}"),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
