//! Prompt construction for every model-backed task.
//!
//! Each builder is a pure function from typed parameters to one instruction
//! string. User-supplied text is interpolated literally, quotes included;
//! the model sees exactly what the user typed. Builders that pair with a
//! structured-output schema have a matching `*_schema` constructor here so
//! prompt text and enforced shape stay next to each other.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::client::ResponseSchema;
use crate::paper::ResearchPaper;

/// Requested summary size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Detailed,
}

/// Requested summary presentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    #[default]
    Paragraph,
    Bullets,
    Qa,
}

/// Index the model is told to prioritize
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    GoogleScholar,
    #[default]
    General,
    Jstor,
    Pubmed,
    Arxiv,
}

impl SummaryLength {
    /// Stable token used in cache keys
    #[must_use]
    pub const fn key_token(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Detailed => "detailed",
        }
    }

    const fn modifier(self) -> &'static str {
        match self {
            Self::Short => "a concise summary of two to three sentences",
            Self::Medium => "a summary of roughly one paragraph",
            Self::Detailed => {
                "a detailed summary of two to three paragraphs covering methods and findings"
            }
        }
    }
}

impl SummaryStyle {
    #[must_use]
    pub const fn key_token(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Bullets => "bullets",
            Self::Qa => "qa",
        }
    }

    const fn modifier(self) -> &'static str {
        match self {
            Self::Paragraph => "written as flowing prose",
            Self::Bullets => "formatted as markdown bullet points",
            Self::Qa => "formatted as question-and-answer pairs",
        }
    }
}

impl SearchSource {
    #[must_use]
    pub const fn key_token(self) -> &'static str {
        match self {
            Self::GoogleScholar => "google_scholar",
            Self::General => "general",
            Self::Jstor => "jstor",
            Self::Pubmed => "pubmed",
            Self::Arxiv => "arxiv",
        }
    }

    /// Name used inside prompt text; General adds no directive at all
    const fn display_name(self) -> Option<&'static str> {
        match self {
            Self::GoogleScholar => Some("Google Scholar"),
            Self::General => None,
            Self::Jstor => Some("JSTOR"),
            Self::Pubmed => Some("PubMed"),
            Self::Arxiv => Some("arXiv"),
        }
    }
}

/// Optional narrowing constraints; a blank field contributes nothing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedOptions {
    pub start_year: Option<String>,
    pub end_year: Option<String>,
    pub authors: Option<String>,
    pub exclude_keywords: Option<String>,
}

impl AdvancedOptions {
    fn constraint_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(year) = non_blank(&self.start_year) {
            lines.push(format!("- The papers MUST be published in or after {year}."));
        }
        if let Some(year) = non_blank(&self.end_year) {
            lines.push(format!("- The papers MUST be published in or before {year}."));
        }
        if let Some(authors) = non_blank(&self.authors) {
            lines.push(format!(
                "- The papers MUST include work by the following authors: {authors}."
            ));
        }
        if let Some(keywords) = non_blank(&self.exclude_keywords) {
            lines.push(format!(
                "- The papers MUST NOT focus on the following topics or keywords: {keywords}."
            ));
        }
        lines
    }

    /// Tokens contributed to the cache key, blank fields normalized away
    #[must_use]
    pub fn key_tokens(&self) -> [String; 4] {
        [
            normalize(&self.start_year),
            normalize(&self.end_year),
            normalize(&self.authors),
            normalize(&self.exclude_keywords),
        ]
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn normalize(value: &Option<String>) -> String {
    non_blank(value).unwrap_or_default().to_string()
}

/// Full parameter set of one paper search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub source: SearchSource,
    pub summary_length: SummaryLength,
    pub summary_style: SummaryStyle,
    pub advanced: AdvancedOptions,
    /// Titles of favorited papers biasing this search
    pub seed_titles: Vec<String>,
}

/// Delimited output format shared by search and connected-papers prompts
fn delimited_format_rules(with_connection: bool) -> String {
    let mut rules = String::from(
        "Return the results in EXACTLY this format, with no introduction, commentary, \
         or closing remarks:\n\n\
         **Title:** <paper title>\n\
         **Authors:** <comma-separated author names>\n\
         **Year:** <publication year>\n\
         **SourceURL:** <direct link to the paper, or N/A if none was found>\n\
         **Summary:** <summary>\n",
    );
    if with_connection {
        rules.push_str(
            "**Connection:** <one sentence describing how this paper relates to the seed \
             paper, for example that it cites it, extends its method, or is frequently \
             co-cited with it>\n",
        );
    }
    rules.push_str("\nSeparate each paper with a line containing only three hyphens: ---");
    rules
}

/// Build the primary paper-search prompt.
///
/// Deterministic given its inputs. Seed titles, when present, prepend a
/// directive to find related but distinct papers; blank advanced options
/// contribute no constraint clause.
#[must_use]
pub fn search_prompt(request: &SearchRequest, result_count: usize) -> String {
    let mut prompt = String::new();

    if !request.seed_titles.is_empty() {
        prompt.push_str("The user has marked these papers as favorites:\n");
        for title in &request.seed_titles {
            prompt.push_str(&format!("- \"{title}\"\n"));
        }
        prompt.push_str(
            "Find papers thematically related to the favorites but distinct from them. \
             Do NOT include any of the favorite titles in the results.\n\n",
        );
    }

    prompt.push_str(&format!(
        "Use web search to find exactly {result_count} academic papers relevant to the \
         query \"{}\".",
        request.query
    ));

    if let Some(source) = request.source.display_name() {
        prompt.push_str(&format!(
            " You MUST prioritize papers indexed by {source}."
        ));
    }

    let constraints = request.advanced.constraint_lines();
    if !constraints.is_empty() {
        prompt.push_str("\n\nStrict constraints:\n");
        prompt.push_str(&constraints.join("\n"));
    }

    prompt.push_str(&format!(
        "\n\nThe Summary field must contain {}, {}.",
        request.summary_length.modifier(),
        request.summary_style.modifier()
    ));

    prompt.push_str("\n\n");
    prompt.push_str(&delimited_format_rules(false));
    prompt
}

/// Build the clustering prompt over retrieved papers (title and summary
/// pairs, embedded verbatim).
#[must_use]
pub fn analysis_prompt(papers: &[ResearchPaper]) -> String {
    let mut prompt = String::from(
        "Group the following research papers into 2 to 4 thematic clusters. Give each \
         cluster a short theme name of at most five words, and list the exact titles of \
         the papers that belong to it. Every paper must appear in exactly one cluster.\n\n\
         Papers:\n",
    );
    for paper in papers {
        prompt.push_str(&format!(
            "Title: {}\nSummary: {}\n\n",
            paper.title, paper.summary
        ));
    }
    prompt
}

#[must_use]
pub fn analysis_schema() -> ResponseSchema {
    ResponseSchema::object(
        vec![(
            "clusters",
            ResponseSchema::array(ResponseSchema::object(
                vec![
                    ("theme", ResponseSchema::string()),
                    ("papers", ResponseSchema::array(ResponseSchema::string())),
                ],
                vec!["theme", "papers"],
            )),
        )],
        vec!["clusters"],
    )
}

/// Fallback link used when a paper has no source URL of its own
#[must_use]
pub fn fallback_search_link(title: &str) -> String {
    format!(
        "https://www.google.com/search?q={}",
        urlencoding::encode(title)
    )
}

/// Build the citation-generation prompt. Each citation is requested as an
/// HTML snippet whose title anchor carries fixed attributes, linking either
/// the paper's own URL or the fallback search link.
#[must_use]
pub fn citations_prompt(papers: &[ResearchPaper]) -> String {
    let mut prompt = String::from(
        "Generate one APA-style citation for each of the following papers, in order. \
         Render each citation as a single HTML snippet. Wrap the paper title in an \
         anchor tag of exactly this form: \
         <a href=\"URL\" target=\"_blank\" rel=\"noopener noreferrer\" \
         class=\"citation-link\">TITLE</a>. \
         Use the paper's source URL as the href when one is given; otherwise use the \
         fallback link provided for that paper.\n\nPapers:\n",
    );
    for paper in papers {
        prompt.push_str(&format!(
            "Title: {}\nAuthors: {}\nYear: {}\nSource URL: {}\nFallback link: {}\n\n",
            paper.title,
            paper.authors,
            paper.year,
            paper.source_url.as_deref().unwrap_or("none"),
            fallback_search_link(&paper.title)
        ));
    }
    prompt.push_str("Respond with one citation string per paper, in the same order.");
    prompt
}

#[must_use]
pub fn citations_schema() -> ResponseSchema {
    ResponseSchema::object(
        vec![(
            "citations",
            ResponseSchema::array(ResponseSchema::string()),
        )],
        vec!["citations"],
    )
}

/// Build the connected-papers prompt for one seed paper.
#[must_use]
pub fn connected_prompt(seed: &ResearchPaper) -> String {
    let mut prompt = format!(
        "Use web search to find 3 to 5 academic papers closely connected to \"{}\" by {} \
         through citations, shared methods, or frequent co-citation. Do not include the \
         paper itself.",
        seed.title, seed.authors
    );
    prompt.push_str("\n\n");
    prompt.push_str(&delimited_format_rules(true));
    prompt
}

/// Build the search-suggestions prompt for a partial query.
#[must_use]
pub fn suggestions_prompt(query: &str) -> String {
    format!(
        "The user is typing a research query: \"{query}\". Propose exactly 5 short \
         alternative or more specific search queries a researcher might have meant. \
         Keep each suggestion under ten words."
    )
}

#[must_use]
pub fn suggestions_schema() -> ResponseSchema {
    ResponseSchema::object(
        vec![(
            "suggestions",
            ResponseSchema::array(ResponseSchema::string()),
        )],
        vec!["suggestions"],
    )
}

/// Build the PDF-lookup prompt for one paper. The reply is requested as
/// bare JSON; no schema can be attached because this task needs web search.
#[must_use]
pub fn pdf_prompt(paper: &ResearchPaper) -> String {
    format!(
        "Use web search to find a direct link to a freely accessible PDF of the paper \
         \"{}\" by {}. The link MUST point at the PDF file itself, with a URL path that \
         typically ends in .pdf, not at a landing page, abstract page, or login wall. \
         Prefer well-known academic hosts such as arxiv.org, aclanthology.org, \
         ncbi.nlm.nih.gov, or university domains. Respond with only a JSON object of \
         the form {{\"pdfUrl\": \"<url>\"}} and nothing else. If no suitable PDF exists, \
         use an empty string for pdfUrl.",
        paper.title, paper.authors
    )
}

/// System instruction seeding the paper-grounded chat: the current result
/// set's titles and summaries, embedded verbatim.
#[must_use]
pub fn chat_system_instruction(papers: &[ResearchPaper]) -> String {
    let mut instruction = String::from(
        "You are a research assistant helping the user understand a set of papers they \
         just retrieved. Ground your answers in these papers, and say so explicitly when \
         a question goes beyond them.\n\n",
    );
    for paper in papers {
        instruction.push_str(&format!(
            "Title: {}\nSummary: {}\n\n",
            paper.title, paper.summary
        ));
    }
    instruction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str) -> ResearchPaper {
        ResearchPaper {
            title: title.to_string(),
            authors: "Doe, J.".to_string(),
            year: "2019".to_string(),
            summary: "Summary text.".to_string(),
            source_url: None,
        }
    }

    #[test]
    fn test_search_prompt_requests_exact_count_and_format() {
        let request = SearchRequest {
            query: "graph neural networks".to_string(),
            ..SearchRequest::default()
        };
        let prompt = search_prompt(&request, 5);

        assert!(prompt.contains("exactly 5 academic papers"));
        assert!(prompt.contains("\"graph neural networks\""));
        assert!(prompt.contains("**Title:**"));
        assert!(prompt.contains("**SourceURL:**"));
        assert!(prompt.contains("three hyphens: ---"));
    }

    #[test]
    fn test_blank_options_add_no_constraints() {
        let request = SearchRequest {
            query: "q".to_string(),
            advanced: AdvancedOptions {
                start_year: Some("   ".to_string()),
                ..AdvancedOptions::default()
            },
            ..SearchRequest::default()
        };
        let prompt = search_prompt(&request, 5);
        assert!(!prompt.contains("Strict constraints"));
        assert!(!prompt.contains("MUST be published"));
    }

    #[test]
    fn test_populated_options_appear_literally() {
        let request = SearchRequest {
            query: "q".to_string(),
            advanced: AdvancedOptions {
                start_year: Some("2015".to_string()),
                end_year: Some("2020".to_string()),
                authors: Some("Hinton, LeCun".to_string()),
                exclude_keywords: Some("survey".to_string()),
            },
            ..SearchRequest::default()
        };
        let prompt = search_prompt(&request, 5);

        assert!(prompt.contains("in or after 2015"));
        assert!(prompt.contains("in or before 2020"));
        assert!(prompt.contains("Hinton, LeCun"));
        assert!(prompt.contains("MUST NOT focus on the following topics or keywords: survey"));
    }

    #[test]
    fn test_seed_titles_prepend_directive() {
        let request = SearchRequest {
            query: "q".to_string(),
            seed_titles: vec!["Seed Paper".to_string()],
            ..SearchRequest::default()
        };
        let prompt = search_prompt(&request, 5);

        assert!(prompt.starts_with("The user has marked these papers as favorites:"));
        assert!(prompt.contains("- \"Seed Paper\""));
        assert!(prompt.contains("Do NOT include any of the favorite titles"));

        let without_seeds = search_prompt(
            &SearchRequest {
                query: "q".to_string(),
                ..SearchRequest::default()
            },
            5,
        );
        assert!(!without_seeds.contains("favorites"));
    }

    #[test]
    fn test_source_directive_only_for_specific_sources() {
        let mut request = SearchRequest {
            query: "q".to_string(),
            source: SearchSource::Pubmed,
            ..SearchRequest::default()
        };
        assert!(search_prompt(&request, 5).contains("MUST prioritize papers indexed by PubMed"));

        request.source = SearchSource::General;
        assert!(!search_prompt(&request, 5).contains("MUST prioritize"));
    }

    #[test]
    fn test_summary_modifiers_follow_parameters() {
        let mut request = SearchRequest {
            query: "q".to_string(),
            summary_length: SummaryLength::Short,
            summary_style: SummaryStyle::Bullets,
            ..SearchRequest::default()
        };
        let prompt = search_prompt(&request, 5);
        assert!(prompt.contains("two to three sentences"));
        assert!(prompt.contains("markdown bullet points"));

        request.summary_length = SummaryLength::Detailed;
        request.summary_style = SummaryStyle::Qa;
        let prompt = search_prompt(&request, 5);
        assert!(prompt.contains("covering methods and findings"));
        assert!(prompt.contains("question-and-answer"));
    }

    #[test]
    fn test_search_prompt_is_deterministic() {
        let request = SearchRequest {
            query: "stable \"quoted\" query".to_string(),
            ..SearchRequest::default()
        };
        assert_eq!(search_prompt(&request, 5), search_prompt(&request, 5));
    }

    #[test]
    fn test_analysis_prompt_embeds_papers() {
        let prompt = analysis_prompt(&[paper("A"), paper("B")]);
        assert!(prompt.contains("2 to 4 thematic clusters"));
        assert!(prompt.contains("Title: A"));
        assert!(prompt.contains("Title: B"));
    }

    #[test]
    fn test_citations_prompt_carries_anchor_contract_and_fallback() {
        let mut with_url = paper("Known");
        with_url.source_url = Some("https://doi.org/10.1/xyz".to_string());
        let prompt = citations_prompt(&[with_url, paper("Spaced Title")]);

        assert!(prompt.contains("target=\"_blank\""));
        assert!(prompt.contains("rel=\"noopener noreferrer\""));
        assert!(prompt.contains("class=\"citation-link\""));
        assert!(prompt.contains("https://doi.org/10.1/xyz"));
        assert!(prompt.contains("https://www.google.com/search?q=Spaced%20Title"));
    }

    #[test]
    fn test_connected_prompt_includes_connection_field() {
        let prompt = connected_prompt(&paper("Seed"));
        assert!(prompt.contains("3 to 5 academic papers"));
        assert!(prompt.contains("\"Seed\" by Doe, J."));
        assert!(prompt.contains("**Connection:**"));
    }

    #[test]
    fn test_suggestions_prompt_embeds_query() {
        let prompt = suggestions_prompt("quantum err");
        assert!(prompt.contains("\"quantum err\""));
        assert!(prompt.contains("exactly 5"));
    }

    #[test]
    fn test_pdf_prompt_requests_bare_json() {
        let prompt = pdf_prompt(&paper("Target"));
        assert!(prompt.contains("\"Target\""));
        assert!(prompt.contains(".pdf"));
        assert!(prompt.contains("{\"pdfUrl\": \"<url>\"}"));
    }

    #[test]
    fn test_chat_instruction_embeds_result_set() {
        let instruction = chat_system_instruction(&[paper("A"), paper("B")]);
        assert!(instruction.contains("Title: A"));
        assert!(instruction.contains("Title: B"));
        assert!(instruction.contains("Summary text."));
    }
}
