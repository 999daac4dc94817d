use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::{
    ContentSafetyPort, DuplicateLogSinkPort, EventSourcePort, EventStorePort, OrganizerDirectoryPort,
    PacingPort, RunHistoryPort, TelemetrySinkPort, TextClassifierPort,
};
use crate::config::ImportSettings;
use crate::error::{ImportError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::categorize::{CategoryCache, CategoryClassifier};
use crate::pipeline::processing::dedup::DeduplicationEngine;
use crate::pipeline::processing::organizer_match::{OrganizerCache, OrganizerMatcher};
use crate::pipeline::processing::quality_gate::{QualityAssessment, QualityAssessor, TrustedOrganizers};
use crate::pipeline::processing::slug::SlugGenerator;
use crate::pipeline::progress::ProgressReporter;
use crate::types::{EventCategory, ImportRunResult, NewEvent, ProgressStep, RawEvent, SourceConfig, StoredEvent};

/// External collaborators the orchestrator is built from
#[derive(Clone)]
pub struct ImportServices {
    pub store: Arc<dyn EventStorePort>,
    pub directory: Arc<dyn OrganizerDirectoryPort>,
    pub classifier: Arc<dyn TextClassifierPort>,
    pub safety: Arc<dyn ContentSafetyPort>,
    pub pacing: Arc<dyn PacingPort>,
    pub telemetry: Arc<dyn TelemetrySinkPort>,
    pub duplicate_log: Arc<dyn DuplicateLogSinkPort>,
    pub run_history: Option<Arc<dyn RunHistoryPort>>,
}

/// Caches that live for exactly one run
#[derive(Debug, Default)]
struct RunContext {
    categories: CategoryCache,
    organizers: OrganizerCache,
}

/// A survivor of dedup with everything needed to persist it
struct PreparedEvent {
    event: RawEvent,
    category: EventCategory,
    assessment: QualityAssessment,
    organizer_id: Uuid,
}

/// Sequences dedup, categorization, scoring, organizer matching and persistence over one batch
pub struct ImportOrchestrator {
    store: Arc<dyn EventStorePort>,
    dedup: DeduplicationEngine,
    categorizer: CategoryClassifier,
    assessor: QualityAssessor,
    matcher: OrganizerMatcher,
    slugs: SlugGenerator,
    telemetry: Arc<dyn TelemetrySinkPort>,
    duplicate_log: Arc<dyn DuplicateLogSinkPort>,
    run_history: Option<Arc<dyn RunHistoryPort>>,
    settings: ImportSettings,
}

impl ImportOrchestrator {
    pub fn new(services: ImportServices, settings: ImportSettings) -> Self {
        let trusted = TrustedOrganizers::new(settings.trusted_organizers.iter().copied());
        Self {
            dedup: DeduplicationEngine::with_threshold(services.store.clone(), settings.dedup_similarity_threshold),
            categorizer: CategoryClassifier::new(services.classifier, services.pacing),
            assessor: QualityAssessor::new(services.safety, trusted),
            matcher: OrganizerMatcher::with_threshold(services.directory, settings.organizer_similarity_threshold),
            slugs: SlugGenerator::new(settings.slug_max_length, settings.slug_strip_prefixes.clone()),
            store: services.store,
            telemetry: services.telemetry,
            duplicate_log: services.duplicate_log,
            run_history: services.run_history,
            settings,
        }
    }

    fn reporter(&self, run_id: Option<Uuid>) -> ProgressReporter {
        ProgressReporter::new(
            self.telemetry.clone(),
            run_id,
            Duration::from_millis(self.settings.telemetry_timeout_ms),
        )
    }

    /// Fetch a batch from the source adapter and import it
    #[instrument(skip(self, adapter), fields(source = %source.name))]
    pub async fn run_source(
        &self,
        adapter: &dyn EventSourcePort,
        source: &SourceConfig,
        run_id: Option<Uuid>,
    ) -> Result<ImportRunResult> {
        if !source.enabled {
            return Err(ImportError::Config(format!("source '{}' is disabled", source.name)));
        }

        let reporter = self.reporter(run_id);
        reporter.step(ProgressStep::Starting, format!("Starting import for {}", source.name)).await;
        reporter.step(ProgressStep::Scraping, format!("Fetching events from {}", source.name)).await;

        let events = match adapter.fetch_events(source).await {
            Ok(events) => events,
            Err(e) => {
                error!("❌ Fetching events failed: {}", e);
                metrics::import::run_failed(&source.name);
                reporter.step(ProgressStep::Failed, format!("Fetching events failed: {}", e)).await;
                return Err(e);
            }
        };

        self.finish(&reporter, source, events).await
    }

    /// Import an already-scraped batch
    #[instrument(skip(self, events), fields(source = %source.name, events = events.len()))]
    pub async fn run(&self, source: &SourceConfig, events: Vec<RawEvent>, run_id: Option<Uuid>) -> Result<ImportRunResult> {
        let reporter = self.reporter(run_id);
        reporter.step(ProgressStep::Starting, format!("Starting import for {}", source.name)).await;
        self.finish(&reporter, source, events).await
    }

    async fn finish(&self, reporter: &ProgressReporter, source: &SourceConfig, events: Vec<RawEvent>) -> Result<ImportRunResult> {
        metrics::import::run_started(&source.name);
        match self.import_batch(reporter, source, events).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("💥 Import for {} aborted: {}", source.name, e);
                metrics::import::run_failed(&source.name);
                reporter.step(ProgressStep::Failed, format!("Import aborted: {}", e)).await;
                Err(e)
            }
        }
    }

    async fn import_batch(
        &self,
        reporter: &ProgressReporter,
        source: &SourceConfig,
        events: Vec<RawEvent>,
    ) -> Result<ImportRunResult> {
        let mut result = ImportRunResult::new(&source.name);
        let mut ctx = RunContext::default();
        result.events_found = events.len();
        info!("🚀 Importing {} events from {}", result.events_found, source.name);

        // Step 1: dedup, in-batch then against the store
        reporter
            .step_with_metadata(
                ProgressStep::Deduplicating,
                format!("Found {} events", result.events_found),
                json!({ "eventsFound": result.events_found }),
            )
            .await;
        let outcome = self.dedup.deduplicate(&source.name, events).await?;
        result.duplicates_skipped = result.events_found - outcome.unique.len();
        let unique = outcome.unique;
        let duplicates = outcome.duplicates;
        info!(
            "🔍 {} unique events, {} duplicates skipped ({} in batch, {} already stored)",
            unique.len(),
            result.duplicates_skipped,
            outcome.in_batch_dropped,
            duplicates.len()
        );
        reporter
            .step_with_metadata(
                ProgressStep::Deduplicating,
                format!("{} unique events, {} duplicates skipped", unique.len(), result.duplicates_skipped),
                json!({
                    "unique": unique.len(),
                    "duplicatesSkipped": result.duplicates_skipped,
                    "inBatchDuplicates": outcome.in_batch_dropped,
                    "storedDuplicates": duplicates.len(),
                }),
            )
            .await;

        // Step 2: categorize, one classifier call per distinct name
        reporter
            .step(ProgressStep::Categorizing, format!("Categorizing {} events", unique.len()))
            .await;
        let default_category = source.default_category.unwrap_or(self.settings.default_category);
        let categories = self
            .categorizer
            .categorize(&unique, &mut ctx.categories, default_category)
            .await;

        // Steps 3-4: per-event quality and organizer resolution
        reporter
            .step(ProgressStep::MatchingOrganizers, format!("Scoring and matching {} events", unique.len()))
            .await;
        let mut prepared = Vec::with_capacity(unique.len());
        for (event, category) in unique.into_iter().zip(categories) {
            let assessment = self.assessor.assess(&event, source.organizer_id).await;
            let organizer_id = if source.aggregator {
                self.matcher
                    .resolve(event.metadata.as_ref(), source.organizer_id, &mut ctx.organizers)
                    .await?
                    .organizer_id
            } else {
                source.organizer_id
            };
            prepared.push(PreparedEvent {
                event,
                category,
                assessment,
                organizer_id,
            });
        }

        // Steps 5-7: validate, identify and persist one at a time
        let total = prepared.len();
        reporter
            .progress(ProgressStep::Importing, format!("Importing {} events", total), 0, total)
            .await;
        let importing_started = Instant::now();
        for item in prepared {
            let name = item.event.name.clone();
            if let Err(e) = validate(&item.event) {
                warn!("Skipping invalid event \"{}\": {}", name, e);
                result.errors.push(format!("Skipped \"{}\": {}", name, e));
                continue;
            }

            match self.persist(source, item).await {
                Ok(stored) => {
                    result.events_imported += 1;
                    debug!("Imported \"{}\" as {}", stored.name, stored.identifier);
                    if result.events_imported % self.settings.progress_interval.max(1) == 0 {
                        reporter
                            .progress_since(
                                importing_started,
                                ProgressStep::Importing,
                                format!("Imported {} of {} events", result.events_imported, total),
                                result.events_imported,
                                total,
                            )
                            .await;
                    }
                }
                Err(e) if e.is_infrastructure() => return Err(e),
                Err(e) => {
                    error!("Failed to import \"{}\": {}", name, e);
                    result.errors.push(format!("Failed to import \"{}\": {}", name, e));
                }
            }
        }

        // Step 9: duplicate log, once per run
        if !duplicates.is_empty() {
            if let Err(e) = self.duplicate_log.write_duplicates(&duplicates).await {
                error!("Failed to persist duplicate log: {}", e);
                result.errors.push(format!("Failed to persist duplicate log: {}", e));
            }
        }

        let elapsed = reporter.elapsed();
        info!(
            "🎉 Import for {} completed: {} found, {} imported, {} duplicates, {} errors in {:.2}s",
            source.name,
            result.events_found,
            result.events_imported,
            result.duplicates_skipped,
            result.errors.len(),
            elapsed.as_secs_f64()
        );
        metrics::import::run_finished(
            &source.name,
            result.events_found,
            result.events_imported,
            result.errors.len(),
            elapsed.as_secs_f64(),
        );
        reporter
            .step_with_metadata(
                ProgressStep::Completed,
                format!(
                    "Imported {} of {} events ({} duplicates, {} errors)",
                    result.events_imported,
                    result.events_found,
                    result.duplicates_skipped,
                    result.errors.len()
                ),
                json!({
                    "eventsFound": result.events_found,
                    "eventsImported": result.events_imported,
                    "duplicatesSkipped": result.duplicates_skipped,
                    "errors": result.errors.len(),
                    "categoryCacheSize": ctx.categories.len(),
                    "durationMs": elapsed.as_millis() as u64,
                }),
            )
            .await;

        if let Some(history) = &self.run_history {
            if let Err(e) = history.record_run(&result).await {
                warn!("Failed to record run history for {}: {}", source.name, e);
            }
        }

        Ok(result)
    }

    async fn persist(&self, source: &SourceConfig, item: PreparedEvent) -> Result<StoredEvent> {
        let identifier = self.slugs.unique_slug(&item.event.name, &self.store).await?;
        let PreparedEvent {
            event,
            category,
            assessment,
            organizer_id,
        } = item;

        let quality_issues = if assessment.issues.is_empty() {
            None
        } else {
            Some(assessment.issues.join("; "))
        };

        self.store
            .insert(NewEvent {
                identifier,
                name: event.name.trim().to_string(),
                description: event.description,
                date_time: event.date_time,
                location: event.location,
                venue_name: event.venue_name,
                price: event.price,
                image_url: event.image_url,
                source_url: event.source_url,
                category,
                status: assessment.status,
                quality_score: assessment.score,
                quality_issues,
                auto_published: assessment.auto_published,
                organizer_id,
                source_name: source.name.clone(),
            })
            .await
    }
}

/// Name, date and location are required for persistence
fn validate(event: &RawEvent) -> Result<()> {
    for (field, value) in [
        ("name", &event.name),
        ("date_time", &event.date_time),
        ("location", &event.location),
    ] {
        if value.trim().is_empty() {
            return Err(ImportError::Validation(field.to_string()));
        }
    }
    Ok(())
}
