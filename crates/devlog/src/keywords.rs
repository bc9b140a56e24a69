//! Keyword extraction from free text.
//!
//! Turns titles and descriptions into a short, ordered list of significant
//! tokens used for tagging and correlation.

/// Maximum number of keywords returned by [`extract`].
pub const MAX_KEYWORDS: usize = 10;

/// Tokens with this many characters or fewer are discarded.
pub const MIN_TOKEN_EXCLUSIVE: usize = 2;

/// Articles, conjunctions, common prepositions and auxiliaries.
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "nor", "yet", "so", "in", "on", "at", "to", "for",
    "of", "with", "by", "from", "into", "onto", "upon", "about", "over", "under", "during",
    "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did",
    "will", "would", "could", "should",
];

/// Extracts up to [`MAX_KEYWORDS`] significant tokens from `text`.
///
/// The text is lowercased, punctuation becomes whitespace, and tokens that
/// are too short or are stopwords are dropped. Survivors keep their order of
/// occurrence; nothing is ranked or sorted.
#[must_use]
pub fn extract(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > MIN_TOKEN_EXCLUSIVE)
        .filter(|token| !STOPWORDS.contains(token))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}
