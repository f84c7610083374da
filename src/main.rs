//! Command line interface for model-grounded research paper discovery.
//!
//! `search` runs one query and prints the parsed papers; `interactive`
//! opens a session with analysis, citations, connected papers, PDF lookup
//! and a chat grounded in the current results; `config` manages the
//! config file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{builder::ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use research_scout::{
    Analytics, AnalysisTool, ChatSession, CitationTool, Config, ConnectedPapersTool, Credentials,
    Error, Event, GeminiClient, GroundingSource, ModelGateway, PdfLinkTool, ResearchPaper,
    SearchCache, SearchOutcome, SearchRequest, SearchSource, SearchTool, SuggestionTool,
    SummaryLength, SummaryStyle, Task,
};

#[derive(Parser, Debug)]
#[command(
    name = "research-scout",
    version,
    about = "Discover academic papers through a web-grounded language model"
)]
struct Cli {
    /// Path to a config file (default: the platform config directory)
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Force JSON log output (default: JSON whenever stderr is not a terminal)
    #[arg(long, global = true)]
    log_json: bool,

    /// Without a subcommand an interactive session starts
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one paper search and print the results
    Search(SearchArgs),
    /// Interactive session with analysis, citations and chat
    Interactive,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Topic query
    query: String,

    /// Index the model should prioritize
    #[arg(long, value_enum, default_value_t)]
    source: SearchSource,

    /// Summary length
    #[arg(long, value_enum, default_value_t)]
    length: SummaryLength,

    /// Summary style
    #[arg(long, value_enum, default_value_t)]
    style: SummaryStyle,

    /// Only papers published in or after this year
    #[arg(long, value_name = "YEAR")]
    start_year: Option<String>,

    /// Only papers published in or before this year
    #[arg(long, value_name = "YEAR")]
    end_year: Option<String>,

    /// Require work by these authors (free text)
    #[arg(long)]
    authors: Option<String>,

    /// Topics or keywords the papers must not focus on
    #[arg(long, value_name = "KEYWORDS")]
    exclude: Option<String>,

    /// Also group the results into thematic clusters
    #[arg(long)]
    analyze: bool,

    /// Also generate formatted citations
    #[arg(long)]
    cite: bool,

    /// Also try to resolve a direct PDF link per paper
    #[arg(long)]
    pdf: bool,

    /// Print the full result as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Everything a session needs, wired once at startup
struct App {
    analytics: Analytics,
    cache: SearchCache,
    search: SearchTool,
    analysis: AnalysisTool,
    citations: CitationTool,
    connected: ConnectedPapersTool,
    suggestions: SuggestionTool,
    pdf: PdfLinkTool,
    gateway: Arc<dyn ModelGateway>,
}

impl App {
    fn new(config: Config) -> anyhow::Result<Self> {
        let credentials = Credentials::from_env()?;
        let config = Arc::new(config);
        let gateway: Arc<dyn ModelGateway> =
            Arc::new(GeminiClient::new(&config, &credentials)?);
        let cache = SearchCache::new(config.cache_ttl());

        Ok(Self {
            search: SearchTool::new(gateway.clone(), cache.clone(), config.clone()),
            analysis: AnalysisTool::new(gateway.clone()),
            citations: CitationTool::new(gateway.clone(), cache.clone()),
            connected: ConnectedPapersTool::new(gateway.clone()),
            suggestions: SuggestionTool::new(gateway.clone(), config.search.min_suggestion_len),
            pdf: PdfLinkTool::new(gateway.clone()),
            analytics: Analytics::new(),
            cache,
            gateway,
        })
    }

    /// Action-boundary error handling: record the failure and show the
    /// user-facing message instead of the raw error.
    fn report(&self, task: Task, err: &Error) {
        self.analytics.record(&Event::ActionFailed {
            task,
            kind: err.kind(),
        });
        eprintln!("error: {}", err.user_message());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&cli, &config);

    match cli.command {
        Some(Commands::Search(args)) => run_search(config, args).await,
        Some(Commands::Interactive) | None => run_interactive(config).await,
        Some(Commands::Config { action }) => run_config(config, &cli.config, action),
    }
}

fn init_logging(cli: &Cli, config: &Config) {
    let default_level = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if cli.log_json || !atty::is(atty::Stream::Stderr) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[derive(Serialize)]
struct SearchReport<'a> {
    papers: &'a [ResearchPaper],
    citations: &'a [String],
    sources: &'a [GroundingSource],
    from_cache: bool,
}

async fn run_search(config: Config, args: SearchArgs) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let request = SearchRequest {
        query: args.query.clone(),
        source: args.source,
        summary_length: args.length,
        summary_style: args.style,
        advanced: research_scout::AdvancedOptions {
            start_year: args.start_year.clone(),
            end_year: args.end_year.clone(),
            authors: args.authors.clone(),
            exclude_keywords: args.exclude.clone(),
        },
        seed_titles: Vec::new(),
    };

    let outcome = match app.search.search(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            app.report(Task::Search, &e);
            std::process::exit(1);
        }
    };
    app.analytics.record(&Event::SearchCompleted {
        query: &request.query,
        paper_count: outcome.papers.len(),
        from_cache: outcome.from_cache,
    });

    let mut citations = outcome.citations.clone();
    if args.cite && citations.is_empty() {
        match app
            .citations
            .generate(&outcome.papers, &outcome.cache_key)
            .await
        {
            Ok(generated) => {
                app.analytics.record(&Event::CitationsGenerated {
                    citation_count: generated.len(),
                });
                citations = generated;
            }
            Err(e) => app.report(Task::Citations, &e),
        }
    }

    if args.json {
        let report = SearchReport {
            papers: &outcome.papers,
            citations: &citations,
            sources: &outcome.sources,
            from_cache: outcome.from_cache,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_papers(&outcome);
    if !citations.is_empty() {
        println!("\nCitations:");
        for citation in &citations {
            println!("  {citation}");
        }
    }

    if args.analyze {
        match app.analysis.analyze(&outcome.papers).await {
            Ok(result) => {
                app.analytics.record(&Event::AnalysisCompleted {
                    cluster_count: result.clusters.len(),
                });
                print_clusters(&result.clusters);
            }
            Err(e) => app.report(Task::Analysis, &e),
        }
    }

    if args.pdf {
        println!("\nPDF links:");
        for paper in &outcome.papers {
            let found = app.pdf.find(paper).await;
            app.analytics.record(&Event::PdfResolved {
                found: found.is_some(),
            });
            match found {
                Some(url) => println!("  {}: {url}", paper.title),
                None => println!("  {}: not found", paper.title),
            }
        }
    }

    Ok(())
}

fn print_papers(outcome: &SearchOutcome) {
    if outcome.from_cache {
        println!("(served from cache)\n");
    }
    for (index, paper) in outcome.papers.iter().enumerate() {
        println!("{}. {} ({})", index + 1, paper.title, paper.year);
        println!("   {}", paper.authors);
        if let Some(url) = &paper.source_url {
            println!("   {url}");
        }
        for line in paper.summary.lines() {
            println!("   {line}");
        }
        println!();
    }
    if !outcome.sources.is_empty() {
        println!("Sources consulted:");
        for source in &outcome.sources {
            println!("  {} <{}>", source.title, source.uri);
        }
    }
}

fn print_clusters(clusters: &[research_scout::Cluster]) {
    println!("\nClusters:");
    for cluster in clusters {
        println!("  {}", cluster.theme);
        for title in &cluster.papers {
            println!("    - {title}");
        }
    }
}

const INTERACTIVE_HELP: &str = "\
Type a query to search. Commands:
  /suggest <text>    related-query suggestions
  /analyze           cluster the current results
  /cite              generate citations for the current results
  /connected <n>     papers connected to result n
  /pdf <n>           direct PDF link for result n
  /chat <message>    ask about the current results
  /papers            reprint the current results
  /fav <n>           toggle result n as a favorite seed
  /cache             cache statistics
  /help              this help
  /quit              exit";

async fn run_interactive(config: Config) -> anyhow::Result<()> {
    use std::io::Write as _;

    let app = App::new(config)?;
    let mut reader = BufReader::new(tokio::io::stdin()).lines();

    let mut current: Option<SearchOutcome> = None;
    let mut chat = ChatSession::new(app.gateway.clone(), &[]);
    let mut favorites: Vec<String> = Vec::new();

    println!("research-scout interactive session");
    println!("{INTERACTIVE_HELP}\n");

    loop {
        print!("research> ");
        std::io::stdout().flush()?;

        let Some(line) = reader.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
            match name {
                "quit" | "exit" => break,
                "help" => println!("{INTERACTIVE_HELP}"),
                "suggest" => {
                    let suggestions = app.suggestions.suggest(rest).await;
                    if suggestions.is_empty() {
                        println!("no suggestions");
                    }
                    for suggestion in suggestions {
                        println!("  {suggestion}");
                    }
                }
                "analyze" => match current.as_ref() {
                    Some(outcome) => match app.analysis.analyze(&outcome.papers).await {
                        Ok(result) => {
                            app.analytics.record(&Event::AnalysisCompleted {
                                cluster_count: result.clusters.len(),
                            });
                            print_clusters(&result.clusters);
                        }
                        Err(e) => app.report(Task::Analysis, &e),
                    },
                    None => println!("search first"),
                },
                "cite" => match current.as_ref() {
                    Some(outcome) => {
                        match app
                            .citations
                            .generate(&outcome.papers, &outcome.cache_key)
                            .await
                        {
                            Ok(citations) => {
                                app.analytics.record(&Event::CitationsGenerated {
                                    citation_count: citations.len(),
                                });
                                for citation in citations {
                                    println!("  {citation}");
                                }
                            }
                            Err(e) => app.report(Task::Citations, &e),
                        }
                    }
                    None => println!("search first"),
                },
                "connected" => match pick_paper(current.as_ref(), rest) {
                    Some(paper) => match app.connected.find(paper).await {
                        Ok(connected) => {
                            app.analytics.record(&Event::ConnectedPapersFound {
                                paper_count: connected.len(),
                            });
                            for item in connected {
                                println!(
                                    "  {} ({}) - {}",
                                    item.paper.title, item.paper.year, item.connection
                                );
                            }
                        }
                        Err(e) => app.report(Task::ConnectedPapers, &e),
                    },
                    None => println!("usage: /connected <result number>"),
                },
                "pdf" => match pick_paper(current.as_ref(), rest) {
                    Some(paper) => {
                        let found = app.pdf.find(paper).await;
                        app.analytics.record(&Event::PdfResolved {
                            found: found.is_some(),
                        });
                        match found {
                            Some(url) => println!("  {url}"),
                            None => println!("  no direct PDF found"),
                        }
                    }
                    None => println!("usage: /pdf <result number>"),
                },
                "chat" => {
                    if current.is_none() {
                        println!("search first");
                        continue;
                    }
                    match chat
                        .send(rest, |delta| {
                            print!("{delta}");
                            let _ = std::io::stdout().flush();
                        })
                        .await
                    {
                        Ok(reply) => {
                            println!();
                            app.analytics.record(&Event::ChatMessageSent {
                                reply_chars: reply.chars().count(),
                            });
                        }
                        Err(e) => {
                            println!();
                            app.report(Task::Chat, &e);
                        }
                    }
                }
                "papers" => match current.as_ref() {
                    Some(outcome) => print_papers(outcome),
                    None => println!("search first"),
                },
                "fav" => match pick_paper(current.as_ref(), rest) {
                    Some(paper) => {
                        let title = paper.title.clone();
                        if let Some(position) = favorites.iter().position(|t| *t == title) {
                            favorites.remove(position);
                            println!("unfavorited: {title}");
                        } else {
                            println!("favorited: {title}");
                            favorites.push(title);
                        }
                    }
                    None => println!("usage: /fav <result number>"),
                },
                "cache" => {
                    let (total, expired) = app.cache.stats().await;
                    println!("cache entries: {total} ({expired} expired)");
                }
                other => println!("unknown command: /{other}"),
            }
            continue;
        }

        // Anything else is a search query
        let request = SearchRequest {
            query: line.clone(),
            seed_titles: favorites.clone(),
            ..SearchRequest::default()
        };
        match app.search.search(&request).await {
            Ok(outcome) => {
                app.analytics.record(&Event::SearchCompleted {
                    query: &request.query,
                    paper_count: outcome.papers.len(),
                    from_cache: outcome.from_cache,
                });
                print_papers(&outcome);
                chat.reset(&outcome.papers);
                current = Some(outcome);
            }
            Err(e) => app.report(Task::Search, &e),
        }
    }

    Ok(())
}

fn pick_paper<'a>(outcome: Option<&'a SearchOutcome>, arg: &str) -> Option<&'a ResearchPaper> {
    let outcome = outcome?;
    let index: usize = arg.trim().parse().ok()?;
    outcome.papers.get(index.checked_sub(1)?)
}

fn run_config(
    config: Config,
    explicit_path: &Option<PathBuf>,
    action: ConfigAction,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = explicit_path
                .clone()
                .or_else(Config::default_file)
                .context("no config directory available on this platform")?;
            if path.exists() && !force {
                anyhow::bail!(
                    "config file already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(&path, Config::default().to_toml()?)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", config.to_toml()?);
            let key_present = std::env::var("GEMINI_API_KEY")
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false);
            println!("# GEMINI_API_KEY: {}", if key_present { "set" } else { "NOT SET" });
            Ok(())
        }
    }
}
