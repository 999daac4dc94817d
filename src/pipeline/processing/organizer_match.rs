use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::ports::OrganizerDirectoryPort;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::utils::{StringUtils, VENUE_STOP_WORDS};
use crate::types::{EventMetadata, OrganizerSummary};

/// Default minimum similarity for a fuzzy venue match
pub const DEFAULT_ORGANIZER_THRESHOLD: f64 = 0.80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizerMatchType {
    Exact,
    Venue,
    Contact,
    Fuzzy,
    Default,
}

impl OrganizerMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizerMatchType::Exact => "exact",
            OrganizerMatchType::Venue => "venue",
            OrganizerMatchType::Contact => "contact",
            OrganizerMatchType::Fuzzy => "fuzzy",
            OrganizerMatchType::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerMatch {
    pub organizer_id: Uuid,
    pub match_type: OrganizerMatchType,
    pub confidence: f64,
    /// Metadata field that produced the match
    pub matched_field: Option<String>,
}

impl OrganizerMatch {
    fn fallback(default_id: Uuid) -> Self {
        Self {
            organizer_id: default_id,
            match_type: OrganizerMatchType::Default,
            confidence: 0.5,
            matched_field: None,
        }
    }
}

/// Run-scoped lookups shared by every event in one import
#[derive(Debug, Default)]
pub struct OrganizerCache {
    by_name: HashMap<String, Option<Uuid>>,
    directory: Option<Vec<OrganizerSummary>>,
}

impl OrganizerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_names(&self) -> usize {
        self.by_name.len()
    }
}

/// Resolves source metadata to a known organizer, first matching strategy wins
pub struct OrganizerMatcher {
    directory: Arc<dyn OrganizerDirectoryPort>,
    threshold: f64,
}

impl OrganizerMatcher {
    pub fn new(directory: Arc<dyn OrganizerDirectoryPort>) -> Self {
        Self::with_threshold(directory, DEFAULT_ORGANIZER_THRESHOLD)
    }

    pub fn with_threshold(directory: Arc<dyn OrganizerDirectoryPort>, threshold: f64) -> Self {
        Self { directory, threshold }
    }

    /// Directory failures propagate; they are infrastructure errors.
    pub async fn resolve(
        &self,
        metadata: Option<&EventMetadata>,
        default_id: Uuid,
        cache: &mut OrganizerCache,
    ) -> Result<OrganizerMatch> {
        let Some(metadata) = metadata else {
            return Ok(OrganizerMatch::fallback(default_id));
        };

        let found = match self.match_exact_name(metadata, cache).await? {
            Some(m) => Some(m),
            None => match self.match_exact_venue(metadata).await? {
                Some(m) => Some(m),
                None => match self.match_contact(metadata).await? {
                    Some(m) => Some(m),
                    None => self.match_fuzzy_venue(metadata, cache).await?,
                },
            },
        };

        match found {
            Some((organizer_match, raw_value)) => {
                info!(
                    organizer_id = %organizer_match.organizer_id,
                    match_type = organizer_match.match_type.as_str(),
                    confidence = organizer_match.confidence,
                    field = organizer_match.matched_field.as_deref().unwrap_or(""),
                    value = %raw_value,
                    "Matched organizer"
                );
                metrics::organizer::matched(organizer_match.match_type.as_str());
                Ok(organizer_match)
            }
            None => Ok(OrganizerMatch::fallback(default_id)),
        }
    }

    async fn match_exact_name(
        &self,
        metadata: &EventMetadata,
        cache: &mut OrganizerCache,
    ) -> Result<Option<(OrganizerMatch, String)>> {
        let Some(name) = non_blank(metadata.organizer_name.as_deref()) else {
            return Ok(None);
        };
        let key = name.to_lowercase();
        let id = match cache.by_name.get(&key) {
            Some(cached) => *cached,
            None => {
                let id = self.directory.find_by_name(name).await?;
                cache.by_name.insert(key, id);
                id
            }
        };
        Ok(id.map(|organizer_id| {
            (
                OrganizerMatch {
                    organizer_id,
                    match_type: OrganizerMatchType::Exact,
                    confidence: 1.0,
                    matched_field: Some("organizerName".to_string()),
                },
                name.to_string(),
            )
        }))
    }

    async fn match_exact_venue(&self, metadata: &EventMetadata) -> Result<Option<(OrganizerMatch, String)>> {
        let Some(venue) = non_blank(metadata.venue_name.as_deref()) else {
            return Ok(None);
        };
        Ok(self.directory.find_by_venue(venue).await?.map(|organizer_id| {
            (
                OrganizerMatch {
                    organizer_id,
                    match_type: OrganizerMatchType::Venue,
                    confidence: 0.9,
                    matched_field: Some("venueName".to_string()),
                },
                venue.to_string(),
            )
        }))
    }

    async fn match_contact(&self, metadata: &EventMetadata) -> Result<Option<(OrganizerMatch, String)>> {
        let contact = |organizer_id, field: &str, value: &str| {
            (
                OrganizerMatch {
                    organizer_id,
                    match_type: OrganizerMatchType::Contact,
                    confidence: 0.95,
                    matched_field: Some(field.to_string()),
                },
                value.to_string(),
            )
        };

        if let Some(email) = non_blank(metadata.email.as_deref()) {
            if let Some(id) = self.directory.find_by_contact(Some(email), None).await? {
                return Ok(Some(contact(id, "email", email)));
            }
        }
        if let Some(phone) = non_blank(metadata.phone.as_deref()) {
            let stripped = StringUtils::strip_phone(phone);
            if !stripped.is_empty() {
                if let Some(id) = self.directory.find_by_contact(None, Some(&stripped)).await? {
                    return Ok(Some(contact(id, "phone", phone)));
                }
            }
        }
        Ok(None)
    }

    async fn match_fuzzy_venue(
        &self,
        metadata: &EventMetadata,
        cache: &mut OrganizerCache,
    ) -> Result<Option<(OrganizerMatch, String)>> {
        let Some(venue) = non_blank(metadata.venue_name.as_deref()) else {
            return Ok(None);
        };
        let normalized = StringUtils::normalize_for_matching(venue, VENUE_STOP_WORDS);
        if normalized.is_empty() {
            return Ok(None);
        }

        if cache.directory.is_none() {
            cache.directory = Some(self.directory.list_all_with_venue().await?);
        }
        let organizers = cache.directory.as_deref().unwrap_or_default();

        let mut best: Option<(f64, Uuid, &'static str)> = None;
        for organizer in organizers {
            let fields = [("venueName", organizer.venue_name.as_deref()), ("name", Some(organizer.name.as_str()))];
            for (field, value) in fields {
                let Some(value) = value else { continue };
                let score = StringUtils::similarity(
                    &normalized,
                    &StringUtils::normalize_for_matching(value, VENUE_STOP_WORDS),
                );
                if best.map_or(true, |(top, _, _)| score > top) {
                    best = Some((score, organizer.id, field));
                }
            }
        }

        match best {
            Some((score, organizer_id, field)) if score >= self.threshold => Ok(Some((
                OrganizerMatch {
                    organizer_id,
                    match_type: OrganizerMatchType::Fuzzy,
                    confidence: score,
                    matched_field: Some(field.to_string()),
                },
                venue.to_string(),
            ))),
            Some((score, _, _)) => {
                debug!(venue = %venue, best_score = score, "No fuzzy organizer match above threshold");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
