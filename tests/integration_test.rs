use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tokio_test::assert_ok;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use research_scout::{
    AnalysisTool, ChatSession, CitationTool, Config, ConnectedPapersTool, Credentials, Error,
    GeminiClient, ModelGateway, PdfLinkTool, ResearchPaper, SearchCache, SearchRequest,
    SearchTool, SuggestionTool, Task,
};

const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";
const STREAM_PATH: &str = "/models/gemini-2.5-flash:streamGenerateContent";

fn test_config(mock_uri: &str) -> Arc<Config> {
    let mut config = Config::default();
    config.gateway.base_url = mock_uri.to_string();
    Arc::new(config)
}

fn test_gateway(config: &Config) -> Arc<dyn ModelGateway> {
    let credentials = Credentials {
        gemini_api_key: "test-key".to_string(),
    };
    Arc::new(GeminiClient::new(config, &credentials).unwrap())
}

/// A Gemini response envelope whose single candidate carries `text`.
fn envelope(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "groundingMetadata": {
                "groundingChunks": [
                    {"web": {"uri": "https://scholar.example.org", "title": "Scholar"}}
                ]
            }
        }]
    })
}

fn two_paper_reply() -> String {
    "**Title:** Attention Is All You Need\n\
     **Authors:** Vaswani et al.\n\
     **Year:** 2017\n\
     **SourceURL:** https://arxiv.org/abs/1706.03762\n\
     **Summary:** Introduces the transformer architecture built purely on attention.\n\
     ---\n\
     **Title:** BERT: Pre-training of Deep Bidirectional Transformers\n\
     **Authors:** Devlin et al.\n\
     **Year:** 2019\n\
     **SourceURL:** N/A\n\
     **Summary:** Pre-trains bidirectional encoders with masked language modeling.\n\
     It transfers to eleven tasks.\n"
        .to_string()
}

fn sample_paper() -> ResearchPaper {
    ResearchPaper {
        title: "Attention Is All You Need".to_string(),
        authors: "Vaswani et al.".to_string(),
        year: "2017".to_string(),
        summary: "Introduces the transformer architecture.".to_string(),
        source_url: Some("https://arxiv.org/abs/1706.03762".to_string()),
    }
}

#[tokio::test]
async fn test_complete_paper_search_workflow() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());
    let gateway = test_gateway(&config);
    let cache = SearchCache::new(config.cache_ttl());
    let search_tool = SearchTool::new(gateway, cache, config);

    // The search call must carry the web-search tool; exactly one network
    // round trip is allowed, the repeat query below must come from cache.
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({"tools": [{"googleSearch": {}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(&two_paper_reply())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = SearchRequest {
        query: "transformer architectures".to_string(),
        ..SearchRequest::default()
    };

    // Scenario 1: fresh search parses both papers and keeps the grounding
    let outcome = tokio_test::assert_ok!(search_tool.search(&request).await);
    assert_eq!(outcome.papers.len(), 2, "both blocks should parse");
    assert!(!outcome.from_cache);

    let first = &outcome.papers[0];
    assert_eq!(first.title, "Attention Is All You Need");
    assert_eq!(first.year, "2017");
    assert_eq!(
        first.source_url.as_deref(),
        Some("https://arxiv.org/abs/1706.03762")
    );

    let second = &outcome.papers[1];
    assert_eq!(second.source_url, None, "N/A must become a missing URL");
    assert!(
        second.summary.contains("eleven tasks"),
        "multi-line summaries keep their continuation lines"
    );

    assert_eq!(outcome.sources.len(), 1);
    assert_eq!(outcome.sources[0].title, "Scholar");

    // Scenario 2: the identical request replays from cache, no second call
    let replay = search_tool.search(&request).await.unwrap();
    assert!(replay.from_cache, "repeat query should come from cache");
    assert_eq!(replay.papers.len(), 2);
    assert!(replay.sources.is_empty(), "cached replies carry no sources");
}

#[tokio::test]
async fn test_rate_limited_search_is_classified() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "status": "RESOURCE_EXHAUSTED",
                      "message": "Resource has been exhausted (e.g. check quota)."}
        })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let gateway = test_gateway(&config);
    let search_tool = SearchTool::new(gateway, SearchCache::new(config.cache_ttl()), config);

    let request = SearchRequest {
        query: "anything".to_string(),
        ..SearchRequest::default()
    };
    let err = search_tool.search(&request).await.unwrap_err();
    assert!(matches!(err, Error::RateLimit { .. }), "got {err:?}");
    assert!(err.user_message().contains("rate limiting"));
}

#[tokio::test]
async fn test_upstream_failure_is_classified_as_server_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let gateway = test_gateway(&config);
    let search_tool = SearchTool::new(gateway, SearchCache::new(config.cache_ttl()), config);

    let request = SearchRequest {
        query: "anything".to_string(),
        ..SearchRequest::default()
    };
    let err = search_tool.search(&request).await.unwrap_err();
    assert!(matches!(err, Error::Server { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_empty_and_unparsable_replies_are_distinguished() {
    let mock_server = MockServer::start().await;

    // A reply with no candidates at all
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("empty topic ravens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&mock_server)
        .await;

    // Prose that never uses the delimited format
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("prose topic crows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            "I could not find any papers matching that query, sorry.",
        )))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let gateway = test_gateway(&config);
    let search_tool = SearchTool::new(gateway, SearchCache::new(config.cache_ttl()), config);

    let empty = search_tool
        .search(&SearchRequest {
            query: "empty topic ravens".to_string(),
            ..SearchRequest::default()
        })
        .await
        .unwrap_err();
    assert!(
        matches!(empty, Error::EmptyResult { task: Task::Search }),
        "got {empty:?}"
    );

    let unparsable = search_tool
        .search(&SearchRequest {
            query: "prose topic crows".to_string(),
            ..SearchRequest::default()
        })
        .await
        .unwrap_err();
    assert!(
        matches!(unparsable, Error::UnparsableResult),
        "got {unparsable:?}"
    );
    assert_ne!(empty.user_message(), unparsable.user_message());
}

#[tokio::test]
async fn test_citations_are_written_back_to_the_cached_search() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());
    let gateway = test_gateway(&config);
    let cache = SearchCache::new(config.cache_ttl());
    let search_tool = SearchTool::new(gateway.clone(), cache.clone(), config.clone());
    let citation_tool = CitationTool::new(gateway, cache.clone());

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({"tools": [{"googleSearch": {}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(&two_paper_reply())))
        .mount(&mock_server)
        .await;

    // Citation requests use structured output instead of web search
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(
            json!({"generationConfig": {"responseMimeType": "application/json"}}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            r#"{"citations": ["Vaswani et al. (2017).", "Devlin et al. (2019)."]}"#,
        )))
        .mount(&mock_server)
        .await;

    let request = SearchRequest {
        query: "transformer architectures".to_string(),
        ..SearchRequest::default()
    };
    let outcome = search_tool.search(&request).await.unwrap();
    assert!(outcome.citations.is_empty(), "citations are generated lazily");

    let citations = citation_tool
        .generate(&outcome.papers, &outcome.cache_key)
        .await
        .unwrap();
    assert_eq!(citations.len(), 2);
    assert_eq!(citations[0], "Vaswani et al. (2017).");

    // The cached entry now replays with its citations attached
    let cached = cache.get(&outcome.cache_key).await.unwrap();
    assert_eq!(cached.citations, citations);
    assert_eq!(cached.papers.len(), 2);
}

#[tokio::test]
async fn test_analysis_parses_structured_clusters() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            r#"{"clusters": [{"theme": "Attention models", "papers": ["Attention Is All You Need"]}]}"#,
        )))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let analysis_tool = AnalysisTool::new(test_gateway(&config));

    let result = analysis_tool.analyze(&[sample_paper()]).await.unwrap();
    assert_eq!(result.clusters.len(), 1);
    assert_eq!(result.clusters[0].theme, "Attention models");
    assert_eq!(result.clusters[0].papers.len(), 1);
}

#[tokio::test]
async fn test_analysis_json_failure_is_a_parsing_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope("not json, just prose")),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let analysis_tool = AnalysisTool::new(test_gateway(&config));

    let err = analysis_tool.analyze(&[sample_paper()]).await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::Parsing {
                task: Task::Analysis,
                ..
            }
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_connected_papers_workflow() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            "**Title:** Neural Machine Translation by Jointly Learning to Align and Translate\n\
             **Authors:** Bahdanau et al.\n\
             **Year:** 2015\n\
             **SourceURL:** https://arxiv.org/abs/1409.0473\n\
             **Summary:** Introduces additive attention for translation.\n\
             **Connection:** Precursor whose attention mechanism the transformer generalizes.\n",
        )))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let connected_tool = ConnectedPapersTool::new(test_gateway(&config));

    let connected = connected_tool.find(&sample_paper()).await.unwrap();
    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0].paper.year, "2015");
    assert!(connected[0].connection.contains("Precursor"));
}

#[tokio::test]
async fn test_chat_streams_deltas_and_keeps_history() {
    let mock_server = MockServer::start().await;

    let sse_body = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"The paper argues \"}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"attention suffices.\"}]}}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let mut chat = ChatSession::new(test_gateway(&config), &[sample_paper()]);

    let mut deltas = Vec::new();
    let reply = chat
        .send("What is the main claim?", |delta| {
            deltas.push(delta.to_string());
        })
        .await
        .unwrap();

    assert_eq!(reply, "The paper argues attention suffices.");
    assert_eq!(deltas.len(), 2, "each SSE event should surface separately");
    assert_eq!(chat.history().len(), 2, "user and model turns recorded");
}

#[tokio::test]
async fn test_chat_failure_keeps_the_user_turn_only() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let mut chat = ChatSession::new(test_gateway(&config), &[sample_paper()]);

    let err = chat.send("hello?", |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::RateLimit { .. }), "got {err:?}");
    assert_eq!(
        chat.history().len(),
        1,
        "the failed exchange must not record a model turn"
    );
}

#[tokio::test]
async fn test_pdf_lookup_accepts_only_http_links() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("Attention Is All You Need"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            r#"Here it is: {"pdfUrl": "https://arxiv.org/pdf/1706.03762.pdf"}"#,
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("Strange Scheme Study"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            r#"{"pdfUrl": "ftp://archive.example.org/paper.pdf"}"#,
        )))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let pdf_tool = PdfLinkTool::new(test_gateway(&config));

    let found = pdf_tool.find(&sample_paper()).await;
    assert_eq!(
        found.as_deref(),
        Some("https://arxiv.org/pdf/1706.03762.pdf")
    );

    let mut odd_paper = sample_paper();
    odd_paper.title = "Strange Scheme Study".to_string();
    assert_eq!(pdf_tool.find(&odd_paper).await, None);
}

#[tokio::test]
async fn test_suggestions_swallow_gateway_failures() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let suggestion_tool = SuggestionTool::new(test_gateway(&config), 5);

    // A failing gateway degrades to no suggestions
    let suggestions = suggestion_tool.suggest("quantum computing").await;
    assert!(suggestions.is_empty());

    // Short queries never reach the network (the mock expects exactly one call)
    let suggestions = suggestion_tool.suggest("qua").await;
    assert!(suggestions.is_empty());
}

#[tokio::test]
async fn test_configuration_workflow() {
    // Default configuration is valid
    let default_config = Config::default();
    assert!(
        default_config.validate().is_ok(),
        "default config should be valid"
    );
    assert_eq!(default_config.gateway.model, "gemini-2.5-flash");
    assert_eq!(default_config.cache.ttl_secs, 300);

    // Out-of-range values fail validation
    let mut invalid = Config::default();
    invalid.search.result_count = 0;
    assert!(invalid.validate().is_err(), "zero results should be rejected");

    let mut invalid = Config::default();
    invalid.cache.ttl_secs = 0;
    assert!(invalid.validate().is_err(), "zero TTL should be rejected");

    let mut invalid = Config::default();
    invalid.gateway.base_url = "generativelanguage.googleapis.com".to_string();
    assert!(invalid.validate().is_err(), "non-http URL should be rejected");

    // A config file overrides defaults without clobbering the rest
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("config.toml");
    std::fs::write(
        &file,
        "[gateway]\nmodel = \"gemini-2.5-pro\"\n\n[cache]\nttl_secs = 60\n",
    )
    .unwrap();

    let loaded = Config::load(Some(&file)).unwrap();
    assert_eq!(loaded.gateway.model, "gemini-2.5-pro");
    assert_eq!(loaded.cache.ttl_secs, 60);
    assert_eq!(
        loaded.search.result_count, 5,
        "untouched sections keep defaults"
    );
}

#[tokio::test]
async fn test_error_chain() {
    let err = Error::InvalidInput {
        field: "query".to_string(),
        reason: "cannot be empty".to_string(),
    };
    assert_eq!(format!("{err}"), "Invalid input: query - cannot be empty");

    let err = Error::classify(Task::Search, "HTTP 503 Service Unavailable: upstream");
    assert_eq!(err.kind(), "server_error");
    assert!(format!("{err}").contains("paper search"));
}
