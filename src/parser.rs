//! Parsing of the delimited text format the model returns for paper
//! searches and connected-papers lookups.
//!
//! The format is flat: blocks separated by `---` lines, fields tagged
//! `**Label:** value`. Values run until the next field marker or the end
//! of the block, which lets Summary and Connection span multiple lines.
//! Blocks missing a mandatory field are dropped whole; there are no
//! partial records.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::paper::{ConnectedPaper, ResearchPaper};

lazy_static! {
    /// A bolded field label at the start of a line, e.g. `**Title:** ...`
    static ref FIELD_MARKER: Regex =
        Regex::new(r"^\*\*([A-Za-z][A-Za-z ]*?)\s*:\s*\*\*\s*(.*)$").expect("valid marker pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Authors,
    Year,
    SourceUrl,
    Summary,
    Connection,
}

impl Field {
    fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().replace(' ', "").as_str() {
            "title" => Some(Self::Title),
            "authors" => Some(Self::Authors),
            "year" => Some(Self::Year),
            "sourceurl" => Some(Self::SourceUrl),
            "summary" => Some(Self::Summary),
            "connection" => Some(Self::Connection),
            _ => None,
        }
    }

    /// Summary and Connection keep accumulating lines; everything else
    /// takes only the remainder of its marker line.
    const fn spans_lines(self) -> bool {
        matches!(self, Self::Summary | Self::Connection)
    }
}

/// Raw field values collected from one block, before validation
#[derive(Debug, Default)]
struct BlockFields {
    title: Option<String>,
    authors: Option<String>,
    year: Option<String>,
    source_url: Option<String>,
    summary: Option<String>,
    connection: Option<String>,
}

impl BlockFields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Authors => &mut self.authors,
            Field::Year => &mut self.year,
            Field::SourceUrl => &mut self.source_url,
            Field::Summary => &mut self.summary,
            Field::Connection => &mut self.connection,
        }
    }

    fn is_set(&self, field: Field) -> bool {
        match field {
            Field::Title => self.title.is_some(),
            Field::Authors => self.authors.is_some(),
            Field::Year => self.year.is_some(),
            Field::SourceUrl => self.source_url.is_some(),
            Field::Summary => self.summary.is_some(),
            Field::Connection => self.connection.is_some(),
        }
    }

    /// Name of the first missing mandatory field, if any
    fn missing_mandatory(&self, require_connection: bool) -> Option<&'static str> {
        if blank(&self.title) {
            return Some("title");
        }
        if blank(&self.authors) {
            return Some("authors");
        }
        if blank(&self.year) {
            return Some("year");
        }
        if blank(&self.summary) {
            return Some("summary");
        }
        if require_connection && blank(&self.connection) {
            return Some("connection");
        }
        None
    }

    fn into_paper(self) -> ResearchPaper {
        ResearchPaper {
            title: trimmed(self.title),
            authors: trimmed(self.authors),
            year: trimmed(self.year),
            summary: trimmed(self.summary),
            source_url: self.source_url.as_deref().and_then(normalize_url),
        }
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn trimmed(value: Option<String>) -> String {
    value.unwrap_or_default().trim().to_string()
}

/// The model writes "N/A" when it found no link; treat that as absent.
fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() || url.eq_ignore_ascii_case("n/a") || url.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(url.to_string())
    }
}

/// Parse the delimited text returned for a paper search.
///
/// Blocks missing any of title/authors/year/summary are dropped and logged
/// at debug level; output order follows block order in the source text.
#[must_use]
pub fn parse_papers(text: &str) -> Vec<ResearchPaper> {
    let mut papers = Vec::new();
    for (index, block) in split_blocks(text).into_iter().enumerate() {
        let fields = scan_block(&block);
        match fields.missing_mandatory(false) {
            Some(field) => {
                debug!(block = index, missing = field, "dropping incomplete paper block");
            }
            None => papers.push(fields.into_paper()),
        }
    }
    papers
}

/// Parse the connected-papers variant, which additionally requires a
/// non-empty Connection field per block.
#[must_use]
pub fn parse_connected_papers(text: &str) -> Vec<ConnectedPaper> {
    let mut papers = Vec::new();
    for (index, block) in split_blocks(text).into_iter().enumerate() {
        let mut fields = scan_block(&block);
        match fields.missing_mandatory(true) {
            Some(field) => {
                debug!(
                    block = index,
                    missing = field,
                    "dropping incomplete connected-paper block"
                );
            }
            None => {
                let connection = trimmed(fields.connection.take());
                papers.push(ConnectedPaper {
                    paper: fields.into_paper(),
                    connection,
                });
            }
        }
    }
    papers
}

/// Split the full text on lines consisting only of `---`, dropping blocks
/// that are empty after trimming.
fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim() == "---" {
            if !current.trim().is_empty() {
                blocks.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Collect labeled field values from one block.
///
/// Any well-formed `**X:**` line ends the value being accumulated. The
/// first occurrence of a label wins; repeats and unrecognized labels are
/// skipped along with their content.
fn scan_block(block: &str) -> BlockFields {
    let mut fields = BlockFields::default();
    let mut current: Option<Field> = None;
    let mut value = String::new();

    for line in block.lines() {
        if let Some(caps) = FIELD_MARKER.captures(line.trim_start()) {
            if let Some(field) = current.take() {
                *fields.slot(field) = Some(std::mem::take(&mut value));
            }

            let rest = caps.get(2).map_or("", |m| m.as_str());
            match Field::from_label(&caps[1]) {
                Some(field) if !fields.is_set(field) => {
                    if field.spans_lines() {
                        current = Some(field);
                        value = rest.to_string();
                    } else {
                        *fields.slot(field) = Some(rest.trim().to_string());
                    }
                }
                // Repeated or unrecognized label: skip until the next marker
                _ => {}
            }
        } else if current.is_some() {
            value.push('\n');
            value.push_str(line);
        }
    }
    if let Some(field) = current {
        *fields.slot(field) = Some(value);
    }

    fields
}

/// Pull the outermost JSON object out of prose or a fenced code block.
///
/// Used for responses where a schema could not be attached to the request
/// and the model was merely asked to answer with JSON.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
