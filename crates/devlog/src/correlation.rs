//! Correlation of new events with previously recorded ones.
//!
//! The default [`KeywordCorrelator`] favours recall: an earlier entry is
//! related as soon as any keyword of the new event appears in its title or
//! description. Other strategies plug in through the [`Correlator`] trait.

use std::collections::BTreeSet;

use crate::keywords;
use crate::types::{EntryId, LogEntry};

/// Strategy for finding earlier entries related to a new event.
pub trait Correlator: Send + Sync {
    /// Returns the entries of `corpus` related to the given text, in corpus order.
    fn find_similar<'c>(
        &self,
        title: &str,
        description: &str,
        corpus: &'c [LogEntry],
    ) -> Vec<&'c LogEntry>;

    /// Returns the ids of the entries of `corpus` related to the given text.
    fn find_related(&self, title: &str, description: &str, corpus: &[LogEntry]) -> BTreeSet<EntryId> {
        self.find_similar(title, description, corpus)
            .into_iter()
            .map(|entry| entry.id)
            .collect()
    }
}

/// Substring match of extracted keywords against titles and descriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordCorrelator;

impl KeywordCorrelator {
    /// Creates a new keyword correlator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn matches(keywords: &[String], entry: &LogEntry) -> bool {
        let title = entry.title.to_lowercase();
        let description = entry.description.to_lowercase();
        keywords
            .iter()
            .any(|kw| title.contains(kw.as_str()) || description.contains(kw.as_str()))
    }
}

impl Correlator for KeywordCorrelator {
    fn find_similar<'c>(
        &self,
        title: &str,
        description: &str,
        corpus: &'c [LogEntry],
    ) -> Vec<&'c LogEntry> {
        let keywords = keywords::extract(&format!("{title} {description}"));
        if keywords.is_empty() {
            return Vec::new();
        }
        corpus
            .iter()
            .filter(|entry| Self::matches(&keywords, entry))
            .collect()
    }
}
