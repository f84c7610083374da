pub mod analytics;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod paper;
pub mod parser;
pub mod prompt;
pub mod tools;

pub use analytics::{Analytics, Event};
pub use cache::{CachedSearch, SearchCache};
pub use client::{GeminiClient, GroundingSource, ModelGateway};
pub use config::{Config, Credentials};
pub use error::{Error, Result, Task};
pub use paper::{AnalysisResult, Cluster, ConnectedPaper, ResearchPaper};
pub use prompt::{AdvancedOptions, SearchRequest, SearchSource, SummaryLength, SummaryStyle};
pub use tools::{
    AnalysisTool, ChatSession, CitationTool, ConnectedPapersTool, PdfLinkTool, SearchOutcome,
    SearchTool, SuggestionDebouncer, SuggestionTool,
};
