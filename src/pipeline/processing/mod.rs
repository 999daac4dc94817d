// Per-stage processing: dedup, categorization, quality scoring, organizer matching and identifiers

pub mod categorize;
pub mod dedup;
pub mod organizer_match;
pub mod quality_gate;
pub mod slug;
