//! Document-level metadata enrichment.
//!
//! Derives aggregate statistics from the extraction result and, when
//! enabled, proposes auto-tags by keyword frequency. Tagging is best-effort:
//! the pipeline records tags when it can and never fails because of them.

use crate::chunker::tokenize;
use crate::extract::ExtractionResult;
use crate::models::DocumentStats;

/// Compute word/character/page counts for a processed document.
///
/// `word_count` uses the same whitespace tokenizer as the chunker. Formats
/// without a pagination concept report one page.
pub fn compute_stats(extraction: &ExtractionResult) -> DocumentStats {
    DocumentStats {
        page_count: extraction.page_count.unwrap_or(1).max(1),
        word_count: tokenize(&extraction.text).len() as i64,
        character_count: extraction.text.chars().count() as i64,
    }
}

/// Words too common to be useful as tags.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "else", "for", "nor", "so", "yet", "of",
    "to", "in", "on", "at", "by", "with", "from", "as", "is", "are", "was", "were", "be", "been",
    "being", "it", "its", "this", "that", "these", "those", "not", "no", "can", "will", "would",
    "could", "should", "may", "might", "must", "have", "has", "had", "do", "does", "did", "you",
    "your", "we", "our", "they", "their", "he", "she", "his", "her", "i", "my", "me", "us", "them",
    "which", "who", "what", "when", "where", "how", "why", "all", "any", "each", "more", "most",
    "other", "some", "such", "only", "own", "same", "than", "too", "very", "just", "also", "into",
    "over", "under", "about", "after", "before", "between", "through", "during", "there", "here",
];

const MIN_TAG_LENGTH: usize = 3;

/// Propose up to `max_tags` candidate tags by keyword frequency over
/// lowercased alphanumeric words, stopwords excluded. Deterministic:
/// frequency descending, then alphabetical.
pub fn auto_tags(text: &str, max_tags: usize) -> Vec<String> {
    if max_tags == 0 {
        return Vec::new();
    }

    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        let word = raw.to_lowercase();
        if word.len() < MIN_TAG_LENGTH
            || word.chars().all(|c| c.is_numeric())
            || STOPWORDS.contains(&word.as_str())
        {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(max_tags);
    ranked.into_iter().map(|(w, _)| w).collect()
}
