//! Convergence and emergence analysis
//!
//! Two independent passes over the concept index:
//!
//! - **Convergence**: catalog patterns matched across source domains,
//!   with cross-references between atoms sharing vocabulary.
//! - **Emergence**: per-concept timelines across period buckets, scored
//!   for emergence and stability and tagged with innovation markers.

pub mod convergence;
pub mod emergence;

pub use convergence::{
    analyze_convergences, Convergence, ConvergenceMetadata, ConvergenceReport, CrossReference,
    MathematicalConnection,
};
pub use emergence::{
    analyze_emergence, ConceptEvolution, DefinitionStep, DistributionAnalysis, InnovationMarker,
    Period, TemporalMetadata, TemporalMetrics, TemporalReport, TimelineEntry,
};

use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn word_pattern() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"\w+").expect("word pattern is a valid regex"))
}

/// Lowercased words of at least `min_len` characters.
pub fn word_set(text: &str, min_len: usize) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    word_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}
