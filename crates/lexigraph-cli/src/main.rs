//! Lexigraph CLI
//!
//! Crawls the lexicon service breadth-first from one or more seed terms and
//! stores every term and similarity edge it finds in a local term graph:
//!
//! ```text
//! lexigraph -a $KEY -d ./graph -l en -t stockholm -t göteborg -m 2
//! ```
//!
//! The crawl ends on its own once no work is left, or on ctrl-c.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use lexigraph_crawl::{CrawlConfig, CrawlReport, LookupRequest, Pipeline, StopReason};
use lexigraph_lexicon::{HttpLexiconClient, LexiconClient, LexiconConfig, DEFAULT_ENDPOINT};
use lexigraph_store::TermStore;

mod logging;

use logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "lexigraph")]
#[command(about = "Crawl a lexical-similarity service into a term graph")]
struct Cli {
    /// API key for the lexicon service
    #[arg(short = 'a', long, env = "LEXIGRAPH_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Graph store directory (created if missing)
    #[arg(short = 'd', long)]
    db_dir: PathBuf,

    /// ISO 639-1 language code of the seed terms
    #[arg(short = 'l', long)]
    lang: String,

    /// Seed term (repeatable)
    #[arg(short = 't', long = "term", required = true)]
    terms: Vec<String>,

    /// Maximum crawl distance from the seeds [default: 2]
    #[arg(short = 'm', long)]
    max_distance: Option<u32>,

    /// Number of concurrent fetch workers [default: 100]
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Lexicon service base URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// JSON file with crawl settings; flags above take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final graph as JSON
    #[arg(long)]
    export: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn crawl_config(&self) -> Result<CrawlConfig> {
        let mut config = match &self.config {
            Some(path) => CrawlConfig::from_json_file(path)
                .with_context(|| format!("failed to load crawl config {}", path.display()))?,
            None => CrawlConfig::default(),
        };
        if let Some(max_distance) = self.max_distance {
            config.max_distance = max_distance;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }

    fn seeds(&self) -> Vec<LookupRequest> {
        self.terms
            .iter()
            .map(|term| LookupRequest::seed(term.as_str(), self.lang.as_str()))
            .collect()
    }
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help included: anything but a full set of flags is a usage error.
            let _ = err.print();
            std::process::exit(1);
        }
    };
    logging::init(cli.log_format);
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.crawl_config()?;

    let client = HttpLexiconClient::new(
        LexiconConfig::new(cli.api_key.as_str()).with_endpoint(cli.endpoint.as_str()),
    )
    .context("failed to build lexicon client")?;

    let store = TermStore::open(&cli.db_dir)
        .with_context(|| format!("failed to open graph store {}", cli.db_dir.display()))?;
    let store = Arc::new(store);

    eprintln!(
        "{} crawling {} seed(s) in {:?}, max distance {}",
        "→".cyan(),
        cli.terms.len(),
        cli.lang,
        config.max_distance
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;
    let (report, reason) = rt.block_on(crawl(
        config,
        Arc::new(client),
        Arc::clone(&store),
        cli.seeds(),
    ))?;

    if let Some(path) = &cli.export {
        store
            .export_json(path)
            .with_context(|| format!("failed to export graph to {}", path.display()))?;
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    }

    print_summary(&report, reason.as_ref(), &store);

    if let Some(StopReason::Fatal(msg)) = reason {
        bail!("crawl aborted: {msg}");
    }
    Ok(())
}

async fn crawl(
    config: CrawlConfig,
    client: Arc<dyn LexiconClient>,
    store: Arc<TermStore>,
    seeds: Vec<LookupRequest>,
) -> Result<(CrawlReport, Option<StopReason>)> {
    let running = Pipeline::new(config, client, store)
        .start(seeds)
        .context("failed to start crawl")?;
    let stopper = running.stopper();

    let interrupt = running.stopper();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.stop(StopReason::Interrupted);
        }
    });

    let report = running
        .join()
        .await
        .context("crawl did not shut down cleanly")?;
    Ok((report, stopper.reason()))
}

fn print_summary(report: &CrawlReport, reason: Option<&StopReason>, store: &TermStore) {
    let reason = reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("{} crawl stopped ({})", "✓".green().bold(), reason);
    println!(
        "  {:<10} {} ({} found, {} empty, {} retried, {} dropped, {} discarded)",
        "lookups".bold(),
        report.lookups,
        report.found,
        report.empty,
        report.retried,
        report.dropped,
        report.discarded
    );
    println!(
        "  {:<10} {} persisted, {} failed",
        "responses".bold(),
        report.persisted,
        report.persist_failures
    );
    println!(
        "  {:<10} {} nodes (+{}), {} edges (+{}), {} terms seen",
        "graph".bold(),
        store.node_count(),
        report.nodes_created,
        store.edge_count(),
        report.edges_created,
        report.unique_terms
    );
    println!("  {:<10} {:.1}s", "elapsed".bold(), report.elapsed_secs);
}
