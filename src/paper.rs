use serde::{Deserialize, Serialize};

/// Paper record recovered from the model's delimited reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPaper {
    /// Paper title
    pub title: String,
    /// Authors as free text, possibly several names joined by commas or "and"
    pub authors: String,
    /// Publication year as free text, expected to contain a 4-digit year
    pub year: String,
    /// Summary, possibly spanning multiple lines
    pub summary: String,
    /// Link to the paper's landing page or full text, when the model found one
    pub source_url: Option<String>,
}

impl ResearchPaper {
    /// A record is valid only when every mandatory field is non-empty.
    /// The source URL is never required.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty()
            && !self.authors.is_empty()
            && !self.year.is_empty()
            && !self.summary.is_empty()
    }
}

/// A paper related to a seed paper, with the relationship spelled out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedPaper {
    #[serde(flatten)]
    pub paper: ResearchPaper,
    /// One sentence characterizing the relationship to the seed paper
    pub connection: String,
}

impl ConnectedPaper {
    /// Valid only when the underlying paper is valid and the connection
    /// sentence is present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.paper.is_valid() && !self.connection.is_empty()
    }
}

/// One thematic group produced by the clustering analysis.
///
/// `papers` holds title strings echoed back by the model; they are expected
/// to match titles from the analyzed set but are not validated against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Short theme label
    pub theme: String,
    /// Titles of the papers grouped under this theme
    pub papers: Vec<String>,
}

/// Structured result of the clustering analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub clusters: Vec<Cluster>,
}
