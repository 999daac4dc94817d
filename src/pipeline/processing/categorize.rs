use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::ports::{PacingPort, TextClassifierPort};
use crate::observability::metrics;
use crate::types::{EventCategory, RawEvent};

/// Run-scoped map from normalized event name to its resolved category
#[derive(Debug, Default, Clone)]
pub struct CategoryCache {
    entries: HashMap<String, EventCategory>,
}

impl CategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, normalized_name: &str) -> Option<EventCategory> {
        self.entries.get(normalized_name).copied()
    }

    pub fn insert(&mut self, normalized_name: String, category: EventCategory) {
        self.entries.insert(normalized_name, category);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Assigns categories to events, one external call per distinct name
pub struct CategoryClassifier {
    classifier: Arc<dyn TextClassifierPort>,
    pacing: Arc<dyn PacingPort>,
}

impl CategoryClassifier {
    pub fn new(classifier: Arc<dyn TextClassifierPort>, pacing: Arc<dyn PacingPort>) -> Self {
        Self { classifier, pacing }
    }

    /// Categorize `events`, returning one category per event in input order.
    pub async fn categorize(
        &self,
        events: &[RawEvent],
        cache: &mut CategoryCache,
        default_category: EventCategory,
    ) -> Vec<EventCategory> {
        // Group indices by normalized name, keeping first-seen order of groups
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, event) in events.iter().enumerate() {
            let key = event.normalized_name();
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(index);
        }

        let mut categories = vec![default_category; events.len()];
        for key in order {
            let members = &groups[&key];
            let category = match cache.get(&key) {
                Some(cached) => {
                    debug!(name = %key, category = %cached, "Category cache hit");
                    metrics::categorize::cache_hit();
                    cached
                }
                None => {
                    let resolved = self.classify_group(&events[members[0]], default_category).await;
                    cache.insert(key.clone(), resolved);
                    resolved
                }
            };
            for &index in members {
                categories[index] = category;
            }
        }

        categories
    }

    async fn classify_group(&self, representative: &RawEvent, default_category: EventCategory) -> EventCategory {
        self.pacing.wait().await;
        metrics::categorize::classifier_called();

        match self
            .classifier
            .classify(
                &representative.name,
                representative.description.as_deref(),
                representative.venue_or_location(),
            )
            .await
        {
            Ok(label) => match EventCategory::from_label(&label) {
                Some(category) => {
                    debug!(name = %representative.name, category = %category, "Classified event group");
                    category
                }
                None => {
                    warn!(
                        name = %representative.name,
                        label = %label,
                        fallback = %default_category,
                        "Classifier returned unknown label; using default category"
                    );
                    metrics::categorize::fell_back();
                    default_category
                }
            },
            Err(e) => {
                warn!(
                    name = %representative.name,
                    error = %e,
                    fallback = %default_category,
                    "Classifier failed; using default category"
                );
                metrics::categorize::fell_back();
                default_category
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ImportError, Result};
    use crate::infra::rate_limiter::{IntervalGate, NoPacing};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedClassifier {
        calls: AtomicUsize,
        label: &'static str,
        fail_on: Option<&'static str>,
    }

    impl ScriptedClassifier {
        fn new(label: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                label,
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl TextClassifierPort for ScriptedClassifier {
        async fn classify(&self, name: &str, _description: Option<&str>, _venue: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(name) {
                return Err(ImportError::Classifier("timeout".to_string()));
            }
            Ok(self.label.to_string())
        }
    }

    fn event(name: &str) -> RawEvent {
        RawEvent {
            name: name.to_string(),
            date_time: "2025-12-01T19:00:00Z".to_string(),
            location: "Varberg".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_one_call_per_normalized_name() {
        let classifier = Arc::new(ScriptedClassifier::new("music"));
        let stage = CategoryClassifier::new(classifier.clone(), Arc::new(NoPacing));
        let mut cache = CategoryCache::new();

        let events = vec![event("Jazzkväll"), event(" jazzkväll "), event("Quiz"), event("JAZZKVÄLL")];
        let categories = stage.categorize(&events, &mut cache, EventCategory::Other).await;

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(categories, vec![EventCategory::Music; 4]);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_reused_across_batches_in_same_run() {
        let classifier = Arc::new(ScriptedClassifier::new("theater"));
        let stage = CategoryClassifier::new(classifier.clone(), Arc::new(NoPacing));
        let mut cache = CategoryCache::new();

        stage.categorize(&[event("Hamlet")], &mut cache, EventCategory::Other).await;
        let second = stage.categorize(&[event("hamlet")], &mut cache, EventCategory::Other).await;

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second, vec![EventCategory::Theater]);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_default_for_whole_group() {
        let classifier = Arc::new(ScriptedClassifier {
            calls: AtomicUsize::new(0),
            label: "music",
            fail_on: Some("Loppis"),
        });
        let stage = CategoryClassifier::new(classifier, Arc::new(NoPacing));
        let mut cache = CategoryCache::new();

        let events = vec![event("Loppis"), event("Konsert"), event("loppis")];
        let categories = stage.categorize(&events, &mut cache, EventCategory::Market).await;
        assert_eq!(
            categories,
            vec![EventCategory::Market, EventCategory::Music, EventCategory::Market]
        );
    }

    #[tokio::test]
    async fn test_unknown_label_falls_back() {
        let stage = CategoryClassifier::new(Arc::new(ScriptedClassifier::new("opera")), Arc::new(NoPacing));
        let mut cache = CategoryCache::new();
        let categories = stage.categorize(&[event("Carmen")], &mut cache, EventCategory::Culture).await;
        assert_eq!(categories, vec![EventCategory::Culture]);
        assert_eq!(cache.get("carmen"), Some(EventCategory::Culture));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_on_cache_misses() {
        let stage = CategoryClassifier::new(
            Arc::new(ScriptedClassifier::new("music")),
            Arc::new(IntervalGate::from_millis(500)),
        );
        let mut cache = CategoryCache::new();
        let start = tokio::time::Instant::now();

        let events = vec![event("A-konsert"), event("a-konsert"), event("B-konsert"), event("b-konsert")];
        stage.categorize(&events, &mut cache, EventCategory::Other).await;

        // Two distinct names: one paced gap
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(1000));
    }
}
