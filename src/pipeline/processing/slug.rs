use std::sync::Arc;

use crate::app::ports::EventStorePort;
use crate::error::Result;

pub const DEFAULT_SLUG_MAX_LENGTH: usize = 80;

/// Builds URL-safe, store-unique event identifiers
#[derive(Debug, Clone)]
pub struct SlugGenerator {
    max_length: usize,
    strip_prefixes: Vec<String>,
}

impl Default for SlugGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SLUG_MAX_LENGTH, Vec::new())
    }
}

fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        'å' | 'ä' | 'à' | 'á' | 'â' | 'ã' => "a",
        'ö' | 'ø' | 'ò' | 'ó' | 'ô' | 'õ' => "o",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'ü' | 'ù' | 'ú' | 'û' => "u",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'æ' => "ae",
        'ç' => "c",
        'ñ' => "n",
        'ß' => "ss",
        _ => return None,
    })
}

impl SlugGenerator {
    pub fn new(max_length: usize, strip_prefixes: Vec<String>) -> Self {
        Self {
            max_length: max_length.max(1),
            strip_prefixes: strip_prefixes
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Base slug for a name, before store disambiguation
    pub fn slugify(&self, name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        for c in name.to_lowercase().chars() {
            if let Some(replacement) = transliterate(c) {
                slug.push_str(replacement);
            } else if c.is_ascii_alphanumeric() {
                slug.push(c);
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }

        // Strip prefixes before truncating so the length limit applies to the meaningful part
        let mut slug = slug.trim_matches('-');
        for prefix in &self.strip_prefixes {
            if let Some(rest) = slug.strip_prefix(prefix.as_str()) {
                slug = rest.trim_start_matches('-');
            }
        }

        let slug: String = slug.chars().take(self.max_length).collect();
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            "event".to_string()
        } else {
            slug.to_string()
        }
    }

    /// Slug that does not yet exist in the store, suffixed `-2`, `-3`, ... on collision
    pub async fn unique_slug(&self, name: &str, store: &Arc<dyn EventStorePort>) -> Result<String> {
        let base = self.slugify(name);
        if !store.exists_by_identifier(&base).await? {
            return Ok(base);
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{}-{}", base, suffix);
            if !store.exists_by_identifier(&candidate).await? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }
}
