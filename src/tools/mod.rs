pub mod analysis;
pub mod chat;
pub mod citations;
pub mod connected;
pub mod pdf_link;
pub mod search;
pub mod suggestions;

pub use analysis::AnalysisTool;
pub use chat::ChatSession;
pub use citations::CitationTool;
pub use connected::ConnectedPapersTool;
pub use pdf_link::PdfLinkTool;
pub use search::{SearchOutcome, SearchTool};
pub use suggestions::{SuggestionDebouncer, SuggestionTool};
