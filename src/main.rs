//! Digestor CLI - sectioned document review
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use digestor::{
    BatchRecord, BatchRunner, Config, DocumentStatus, Pipeline, RemoteReviewClient, SearchIndex,
    Storage, Strategy,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "digestor")]
#[command(author, version, about = "Sectioned review of PDF and text documents", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Read settings from this file instead of digestor.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a batch of documents (paths or URLs)
    Review {
        /// Files or http(s) URLs, processed in order
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Storage key for the batch (defaults to a timestamp)
        #[arg(long)]
        key: Option<String>,
        /// Send documents to the remote review service instead
        #[arg(long, requires = "collection")]
        remote: bool,
        /// Target collection on the remote service
        #[arg(long)]
        collection: Option<String>,
    },
    /// Show a stored batch
    Show {
        key: String,
        /// Print the extracted text as well
        #[arg(long)]
        text: bool,
    },
    /// List stored batches
    List,
    /// Search stored reviews
    Search {
        /// Search query
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete a stored batch
    Delete { key: String },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("digestor={level}")));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config_path = cli.config;
    let load_config = || match &config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    match cli.command {
        Commands::Review {
            inputs,
            key,
            remote,
            collection,
        } => {
            let config = load_config()?;
            let key = key.unwrap_or_else(|| format!("batch-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S")));

            let strategy = match (remote, collection) {
                (true, Some(collection)) => Strategy::Remote {
                    client: RemoteReviewClient::new(&config.remote.base_url)
                        .with_timeout(Duration::from_secs(config.remote.timeout_secs)),
                    collection,
                },
                _ => Strategy::Local(Pipeline::from_config(&config)?),
            };

            let storage = Storage::open(&config.storage.path)?;
            let search_index = SearchIndex::open_or_warn(config.search_index_path());

            println!("Reviewing {} document(s) as batch {}\n", inputs.len(), key.bold());
            let record = BatchRunner::new(strategy)
                .keep_text(config.storage.keep_text)
                .run_and_persist(&inputs, &storage, search_index.as_ref(), &key)
                .await?;

            print_batch(&record, false);
            println!(
                "\n{} completed, {} partial, {} failed",
                record.count(DocumentStatus::Completed),
                record.count(DocumentStatus::CompletedPartial),
                record.count(DocumentStatus::Failed)
            );
        }
        Commands::Show { key, text } => {
            let config = load_config()?;
            let storage = Storage::open(&config.storage.path)?;
            let record = storage.require_batch(&key)?;
            print_batch(&record, text);
        }
        Commands::List => {
            let config = load_config()?;
            let storage = Storage::open(&config.storage.path)?;
            let batches = storage.list_batches()?;

            if batches.is_empty() {
                println!("No stored batches found.");
            } else {
                println!("Stored batches ({}):\n", batches.len());
                for meta in batches {
                    println!(
                        "📦 {} ({} documents, {})",
                        meta.key.bold(),
                        meta.documents,
                        meta.finished_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        Commands::Search { query, limit } => {
            let config = load_config()?;
            let index = SearchIndex::open(config.search_index_path())?;
            let hits = index.search(&query, limit)?;

            if hits.is_empty() {
                println!("No results found for: {}", query);
            } else {
                println!("Search results for '{}':\n", query);
                for hit in hits {
                    println!("📄 {} (batch {}, #{})", hit.name, hit.batch_key, hit.id);
                }
            }
        }
        Commands::Delete { key } => {
            let config = load_config()?;
            let storage = Storage::open(&config.storage.path)?;
            if storage.delete_batch(&key)? {
                if let Some(index) = SearchIndex::open_or_warn(config.search_index_path()) {
                    if let Err(e) = index.remove_batch(&key) {
                        tracing::warn!("Failed to remove batch {} from search index: {}", key, e);
                    }
                }
                println!("Deleted batch {}", key);
            } else {
                println!("No batch stored under {}", key);
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "digestor", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn status_label(status: DocumentStatus) -> colored::ColoredString {
    match status {
        DocumentStatus::Completed => status.as_str().green(),
        DocumentStatus::CompletedPartial => status.as_str().yellow(),
        DocumentStatus::Failed => status.as_str().red(),
    }
}

fn print_batch(record: &BatchRecord, with_text: bool) {
    for entry in &record.entries {
        println!("=== #{} {} [{}] ===\n", entry.id, entry.name, status_label(entry.status));

        if let Some(error) = &entry.error {
            println!("  {}\n", error.red());
        }
        if let Some(analysis) = &entry.analysis {
            println!("{}\n", analysis);
        }
        if with_text {
            if let Some(text) = &entry.text {
                println!("--- extracted text ({} characters) ---", text.chars().count());
                println!("{}\n", text);
            }
        }
    }
}
