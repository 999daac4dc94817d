use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use event_importer::app::ports::{ContentSafetyPort, TextClassifierPort};
use event_importer::app::{ImportOrchestrator, ImportServices};
use event_importer::config::{Config, DEFAULT_CONFIG_PATH};
use event_importer::infra::in_memory::{
    InMemoryDuplicateLog, InMemoryEventStore, InMemoryOrganizerDirectory, InMemoryRunHistory, InMemoryTelemetrySink,
};
use event_importer::infra::json_source::JsonFileSource;
use event_importer::infra::openai_client::{NoopSafety, OpenAiClient, StaticClassifier};
use event_importer::infra::rate_limiter::IntervalGate;
use event_importer::logging;

#[derive(Parser)]
#[command(name = "event_importer")]
#[command(about = "Import scraped event listings: dedup, categorize, score and publish")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one batch of scraped events for a configured source
    Import {
        /// Source name as configured under [[sources]]
        #[arg(long)]
        source: String,
        /// JSON array of raw events produced by the scraper
        #[arg(long)]
        events: PathBuf,
        /// JSON array of already stored events to dedup against
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// JSON array of organizer records for aggregator matching
        #[arg(long)]
        organizers: Option<PathBuf>,
        /// Run id for progress telemetry; omitted means no telemetry
        #[arg(long)]
        run_id: Option<Uuid>,
    },
    /// List configured sources
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging("logs");

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Sources => {
            if config.sources.is_empty() {
                println!("No sources configured in {}", cli.config.display());
            }
            for source in &config.sources {
                println!(
                    "{:<24} {:<8} {:<10} {}",
                    source.name,
                    if source.enabled { "enabled" } else { "disabled" },
                    if source.aggregator { "aggregator" } else { "direct" },
                    source.url
                );
            }
        }
        Commands::Import {
            source,
            events,
            catalog,
            organizers,
            run_id,
        } => {
            let source = config
                .source(&source)
                .cloned()
                .ok_or_else(|| anyhow!("unknown source '{}'", source))?;

            let store = match catalog {
                Some(path) => InMemoryEventStore::from_json_file(&path)
                    .with_context(|| format!("loading catalog {}", path.display()))?,
                None => InMemoryEventStore::new(),
            };
            let directory = match organizers {
                Some(path) => InMemoryOrganizerDirectory::from_json_file(&path)
                    .with_context(|| format!("loading organizers {}", path.display()))?,
                None => InMemoryOrganizerDirectory::new(Vec::new()),
            };

            let classifier: Arc<dyn TextClassifierPort>;
            let safety: Arc<dyn ContentSafetyPort>;
            match config.classifier.api_key() {
                Some(key) => {
                    let client = Arc::new(OpenAiClient::new(&config.classifier, key)?);
                    classifier = client.clone();
                    safety = client;
                }
                None => {
                    warn!(
                        "{} not set; every event gets the default category and no safety check runs",
                        config.classifier.api_key_env
                    );
                    let fallback = source.default_category.unwrap_or(config.import.default_category);
                    classifier = Arc::new(StaticClassifier(fallback));
                    safety = Arc::new(NoopSafety);
                }
            }

            let services = ImportServices {
                store: Arc::new(store),
                directory: Arc::new(directory),
                classifier,
                safety,
                pacing: Arc::new(IntervalGate::from_millis(config.import.classifier_delay_ms)),
                telemetry: Arc::new(InMemoryTelemetrySink::new()),
                duplicate_log: Arc::new(InMemoryDuplicateLog::new()),
                run_history: Some(Arc::new(InMemoryRunHistory::new())),
            };
            let orchestrator = ImportOrchestrator::new(services, config.import.clone());

            info!("Starting import for {}", source.name);
            let adapter = JsonFileSource::new(events);
            match orchestrator.run_source(&adapter, &source, run_id).await {
                Ok(result) => {
                    if !result.errors.is_empty() {
                        warn!("{} errors encountered during import", result.errors.len());
                    }
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                Err(e) => {
                    error!("Import failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
