mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use pickup_core::{RawUtterance, SearchStore, Splitter};
use pickup_engine::{Pipeline, ResolverContext, SharedContext};
use pickup_nlp::RuleSplitter;
use pickup_store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pickup", version)]
#[command(about = "Resolve spoken taxi pickup locations to dispatchable addresses")]
struct Cli {
    /// Rule set JSON (defaults to the bundled rules)
    #[arg(long, global = true, env = "PICKUP_RULES")]
    rules: Option<PathBuf>,

    /// Gazetteer JSON (defaults to the bundled gazetteer)
    #[arg(long, global = true, env = "PICKUP_GAZETTEER")]
    gazetteer: Option<PathBuf>,

    /// Local POI/address records (JSON array) to search offline
    #[arg(long, global = true, env = "PICKUP_STORE")]
    store: Option<PathBuf>,

    /// Remote search service base URL (requires the `http` feature)
    #[arg(long, global = true, env = "PICKUP_SEARCH_URL")]
    search_url: Option<String>,

    /// Remote splitter base URL (requires the `http` feature)
    #[arg(long, global = true, env = "PICKUP_SPLIT_URL")]
    split_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the normalized form of an utterance
    Normalize { text: String },

    /// Resolve one utterance and print the dispatch record
    Resolve {
        text: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        fleet: String,
        #[arg(long, default_value = "")]
        trunk: String,
        /// Passenger name carried over from a previous trip
        #[arg(long, default_value = "")]
        name: String,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a file of utterances, one per line
    Batch {
        file: PathBuf,
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
    },

    /// Load the rule set and summarise it
    Rules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("pickup v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let context = ResolverContext::load(cli.rules.as_deref(), cli.gazetteer.as_deref())
        .context("loading rules and gazetteer")?;

    match &cli.command {
        Command::Normalize { text } => {
            println!("{}", context.normalizer.normalize(text));
        }
        Command::Rules => {
            context.rules.validate().context("validating rules")?;
            display::print_summary(&context.rules.summary(), context.aliases.rule_count());
        }
        Command::Resolve {
            text,
            phone,
            fleet,
            trunk,
            name,
            json,
        } => {
            let dispatch = context.rules.dispatch.clone();
            let pipeline = build_pipeline(&cli, context)?;
            let call = RawUtterance::new(text.as_str())
                .with_caller(phone.as_str())
                .with_fleet(fleet.as_str(), trunk.as_str())
                .with_passenger(name.as_str(), "");
            let outcome = pipeline.resolve(&call).await;
            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                display::print_outcome(&outcome, &call, &dispatch);
            }
        }
        Command::Batch { file, concurrency } => {
            let dispatch = context.rules.dispatch.clone();
            let pipeline = Arc::new(build_pipeline(&cli, context)?);
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let lines: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();

            let start = Instant::now();
            let mut results: Vec<_> = futures::stream::iter(lines.into_iter().enumerate())
                .map(|(i, line)| {
                    let pipeline = Arc::clone(&pipeline);
                    async move {
                        let call = RawUtterance::new(line);
                        let outcome = pipeline.resolve(&call).await;
                        (i, call, outcome)
                    }
                })
                .buffer_unordered((*concurrency).max(1))
                .collect()
                .await;
            results.sort_by_key(|(i, _, _)| *i);

            let resolved = results.iter().filter(|(_, _, o)| o.status() == 200).count();
            for (_, call, outcome) in &results {
                println!("{}", display::outcome_line(outcome, call, &dispatch));
            }
            eprintln!(
                "  {resolved}/{} resolved in {:.1}s",
                results.len(),
                start.elapsed().as_secs_f64()
            );
        }
    }
    Ok(())
}

fn build_pipeline(cli: &Cli, context: ResolverContext) -> anyhow::Result<Pipeline> {
    let store: Arc<dyn SearchStore> = match (&cli.search_url, &cli.store) {
        (Some(url), _) => remote_store(url)?,
        (None, Some(path)) => Arc::new(
            MemoryStore::load(path).with_context(|| format!("loading {}", path.display()))?,
        ),
        (None, None) => bail!("no search backend: pass --store <FILE> or --search-url <URL>"),
    };
    let splitter: Arc<dyn Splitter> = match &cli.split_url {
        Some(url) => remote_splitter(url)?,
        None => Arc::new(RuleSplitter::new(context.gazetteer.clone())),
    };
    Ok(Pipeline::new(
        Arc::new(SharedContext::new(context)),
        store,
        splitter,
    ))
}

#[cfg(feature = "http")]
fn remote_store(url: &str) -> anyhow::Result<Arc<dyn SearchStore>> {
    Ok(Arc::new(pickup_remote::HttpSearchStore::new(url.to_string())))
}

#[cfg(not(feature = "http"))]
fn remote_store(_url: &str) -> anyhow::Result<Arc<dyn SearchStore>> {
    bail!("--search-url requires building with the `http` feature")
}

#[cfg(feature = "http")]
fn remote_splitter(url: &str) -> anyhow::Result<Arc<dyn Splitter>> {
    Ok(Arc::new(pickup_remote::HttpSplitter::new(url.to_string())))
}

#[cfg(not(feature = "http"))]
fn remote_splitter(_url: &str) -> anyhow::Result<Arc<dyn Splitter>> {
    bail!("--split-url requires building with the `http` feature")
}
