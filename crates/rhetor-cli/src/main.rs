//! Rhetor CLI - multi-agent argumentation analysis
//!
//! Usage:
//!   rhetor analyze    Analyse a text with both agents
//!   rhetor sources    Manage the encrypted source store
//!   rhetor cache      Manage the fetched-text cache
//!   rhetor taxonomy   Show the fallacy taxonomy

mod analyze;
mod sources;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rhetor_core::{AgentId, AnalysisConfig, FallacyTaxonomy};
use rhetor_crypto::SecretString;
use rhetor_sources::{SourceKind, TextCache};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the source-store passphrase
const PASSPHRASE_ENV: &str = "RHETOR_PASSPHRASE";

#[derive(Parser)]
#[command(name = "rhetor")]
#[command(author, version, about = "Multi-agent argumentation analysis")]
#[command(
    long_about = "Rhetor - an informal-fallacy analyst and a propositional-logic analyst \
    take turns on one text until the analysis is complete."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.rhetor/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Source-store passphrase (default: $RHETOR_PASSPHRASE)
    #[arg(long, global = true)]
    passphrase: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one analysis and write the reports
    Analyze(AnalyzeArgs),

    /// Manage the encrypted source store
    Sources {
        #[command(subcommand)]
        action: SourcesAction,
    },

    /// Manage the fetched-text cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show the fallacy taxonomy, or one entry
    Taxonomy {
        /// Taxonomy key, e.g. hasty_generalization
        key: Option<String>,
    },
}

#[derive(Args)]
pub(crate) struct AnalyzeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Turn budget (overrides the config file)
    #[arg(long)]
    max_turns: Option<u32>,

    /// Agent taking the first turn (overrides the config file)
    #[arg(long, value_enum)]
    first_agent: Option<AgentArg>,
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum AgentArg {
    Informal,
    Logic,
}

impl From<AgentArg> for AgentId {
    fn from(agent: AgentArg) -> Self {
        match agent {
            AgentArg::Informal => Self::InformalFallacy,
            AgentArg::Logic => Self::PropositionalLogic,
        }
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Id of a configured source
    #[arg(long)]
    source: Option<String>,

    /// Text to analyse
    #[arg(long)]
    text: Option<String>,

    /// File holding the text to analyse
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SourcesAction {
    /// List configured sources
    List,
    /// Add a source
    Add {
        /// Unique source id
        id: String,
        #[arg(long)]
        label: String,
        #[arg(long, value_enum)]
        kind: KindArg,
        /// Text key, URL, path, the text itself, or the parent id of an extract
        #[arg(long)]
        location: String,
        #[arg(long)]
        start_marker: Option<String>,
        #[arg(long)]
        end_marker: Option<String>,
    },
    /// Remove a source
    Remove { id: String },
    /// Write the current (or default) sources as a sealed store
    Seal,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete cached texts, all of them or one source's
    Clear { id: Option<String> },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Predefined,
    Url,
    File,
    DirectText,
    Extract,
}

impl From<KindArg> for SourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Predefined => Self::Predefined,
            KindArg::Url => Self::Url,
            KindArg::File => Self::File,
            KindArg::DirectText => Self::DirectText,
            KindArg::Extract => Self::Extract,
        }
    }
}

fn passphrase(flag: Option<String>) -> Option<SecretString> {
    flag.or_else(|| std::env::var(PASSPHRASE_ENV).ok())
        .filter(|p| !p.is_empty())
        .map(SecretString::new)
}

pub(crate) fn load_taxonomy(config: &AnalysisConfig) -> anyhow::Result<FallacyTaxonomy> {
    match &config.taxonomy_file {
        Some(path) => Ok(FallacyTaxonomy::from_json_file(path)?),
        None => Ok(FallacyTaxonomy::builtin()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.unwrap_or_else(AnalysisConfig::default_path);
    let config = AnalysisConfig::load_or_default(&config_path);
    let passphrase = passphrase(cli.passphrase);

    match cli.command {
        Commands::Analyze(args) => analyze::run(config, args, passphrase.as_ref()).await?,

        Commands::Sources { action } => match action {
            SourcesAction::List => sources::list(&config, passphrase.as_ref()),
            SourcesAction::Add {
                id,
                label,
                kind,
                location,
                start_marker,
                end_marker,
            } => {
                let descriptor = rhetor_sources::SourceDescriptor::new(id, label, kind.into(), location)
                    .with_markers(start_marker.as_deref(), end_marker.as_deref());
                sources::add(&config, passphrase.as_ref(), descriptor)?
            }
            SourcesAction::Remove { id } => sources::remove(&config, passphrase.as_ref(), &id)?,
            SourcesAction::Seal => sources::seal(&config, passphrase.as_ref())?,
        },

        Commands::Cache { action } => match action {
            CacheAction::Clear { id } => {
                let cache = TextCache::open(config.cache_dir()).await?;
                match id {
                    Some(id) => {
                        if cache.remove(&id).await? {
                            println!("Removed cached text for {}", id);
                        } else {
                            println!("Nothing cached for {}", id);
                        }
                    }
                    None => {
                        let removed = cache.clear().await?;
                        println!("Removed {} cached text(s) from {}", removed, cache.dir().display());
                    }
                }
            }
        },

        Commands::Taxonomy { key } => {
            let taxonomy = load_taxonomy(&config)?;
            match key {
                Some(key) => {
                    let entry = taxonomy
                        .get(&key)
                        .ok_or_else(|| anyhow::anyhow!("unknown fallacy key: {}", key))?;
                    println!("{} ({})", entry.name, entry.key);
                    println!("Category: {}", entry.category);
                    println!();
                    println!("{}", entry.description);
                    if !entry.example.is_empty() {
                        println!();
                        println!("Example: {}", entry.example);
                    }
                }
                None => {
                    for (category, keys) in taxonomy.categories() {
                        println!("{}", category);
                        for key in keys {
                            if let Some(entry) = taxonomy.get(key) {
                                println!("  {:<24} {}", entry.key, entry.name);
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
