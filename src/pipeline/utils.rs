use once_cell::sync::Lazy;
use regex::Regex;

/// Anything that is not a letter, digit or whitespace
static PUNCTUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid punctuation regex"));

/// Words ignored when comparing event names
pub const EVENT_NAME_STOP_WORDS: &[&str] = &[
    "med", "och", "i", "på", "till", "från", "live", "konsert", "show", "presenterar",
];

/// Words ignored when comparing venue and organizer names
pub const VENUE_STOP_WORDS: &[&str] = &["i", "på", "varberg", "sweden", "sverige"];

/// String similarity and normalization utilities for entity matching
pub struct StringUtils;

impl StringUtils {
    /// Lowercase, strip punctuation, collapse whitespace and drop stop-words
    pub fn normalize_for_matching(text: &str, stop_words: &[&str]) -> String {
        let lowered = text.to_lowercase();
        let stripped = PUNCTUATION_RE.replace_all(&lowered, " ");
        stripped
            .split_whitespace()
            .filter(|word| !stop_words.contains(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Sørensen–Dice bigram similarity in [0, 1] on already-normalized strings
    pub fn similarity(a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            // Names made only of stop-words carry no signal
            return if a == b && !a.is_empty() { 1.0 } else { 0.0 };
        }
        strsim::sorensen_dice(a, b)
    }

    /// Similarity of two event names after stop-word normalization
    pub fn event_name_similarity(a: &str, b: &str) -> f64 {
        Self::similarity(
            &Self::normalize_for_matching(a, EVENT_NAME_STOP_WORDS),
            &Self::normalize_for_matching(b, EVENT_NAME_STOP_WORDS),
        )
    }

    /// First token of the venue before any comma or hyphen, e.g.
    /// "Stadsparken Varberg, Norra delen" -> "Stadsparken".
    pub fn venue_keyword(venue: &str) -> Option<String> {
        venue
            .split(|c| c == ',' || c == '-')
            .next()
            .and_then(|head| head.split_whitespace().next())
            .map(str::to_string)
    }

    /// Phone number with every non-alphanumeric separator removed
    pub fn strip_phone(phone: &str) -> String {
        phone.chars().filter(|c| c.is_alphanumeric()).collect()
    }
}
