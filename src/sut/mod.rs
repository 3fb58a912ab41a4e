pub mod corpus;
pub mod source;

use crate::normalize::normalize;
use corpus::ReferenceCorpus;
use serde::Serialize;
use source::{CorpusError, ReferenceSource};
use std::fmt;

/// Normalized characters kept on each side of a hit.
const WINDOW_CHARS: usize = 1000;
/// Excerpts returned per query.
const MAX_MATCHES: usize = 5;

/// Approximate position of a hit inside the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationHint {
    Percent(u8),
    Unknown,
}

impl LocationHint {
    fn new(offset: usize, total: usize) -> Self {
        if total == 0 {
            return LocationHint::Unknown;
        }
        let pct = (offset as f64 / total as f64 * 100.0).round();
        LocationHint::Percent(pct.clamp(0.0, 100.0) as u8)
    }
}

impl fmt::Display for LocationHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationHint::Percent(p) => write!(f, "Approx. position {}% of SUT", p),
            LocationHint::Unknown => write!(f, "Location unknown"),
        }
    }
}

/// A window of normalized reference text around one occurrence of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchExcerpt {
    pub text: String,
    pub location: LocationHint,
}

/// Full-text lookup over the reimbursement rules (SUT) document.
pub struct SutIndex {
    corpus: ReferenceCorpus,
}

impl SutIndex {
    pub fn new(source: impl ReferenceSource + 'static) -> Self {
        Self {
            corpus: ReferenceCorpus::new(source),
        }
    }

    /// Load the reference document now so a broken file fails the run early.
    pub async fn ensure_loaded(&self) -> Result<(), CorpusError> {
        if self.corpus.is_initialized() {
            tracing::debug!("Reference document already loaded");
        }
        self.corpus.get().await.map(|_| ())
    }

    /// Length of the normalized corpus in bytes.
    pub async fn corpus_len(&self) -> Result<usize, CorpusError> {
        Ok(self.corpus.get().await?.len())
    }

    pub async fn find_by_keyword(&self, keyword: &str) -> Result<Vec<MatchExcerpt>, CorpusError> {
        if normalize(keyword).is_empty() {
            return Ok(Vec::new());
        }
        let text = self.corpus.get().await?;
        Ok(find_matches(&text, keyword))
    }

    pub async fn find_by_medicine_name(&self, drug_name: &str) -> Result<Vec<MatchExcerpt>, CorpusError> {
        let matches = self.find_by_keyword(drug_name).await?;
        tracing::debug!("SUT lookup for {}: {} match(es)", drug_name, matches.len());
        Ok(matches)
    }
}

/// Find up to five windowed excerpts of `keyword` in an already normalized corpus.
pub fn find_matches(normalized_text: &str, keyword: &str) -> Vec<MatchExcerpt> {
    let needle = normalize(keyword);
    if needle.is_empty() {
        return Vec::new();
    }
    scan(normalized_text, &needle)
}

fn scan(text: &str, needle: &str) -> Vec<MatchExcerpt> {
    let mut matches = Vec::new();
    let mut start = 0;
    let total_chars = text.chars().count();
    // `chars_before` is the character offset of byte `counted`.
    let mut counted = 0;
    let mut chars_before = 0;

    while start < text.len() && matches.len() < MAX_MATCHES {
        let hit = match text[start..].find(needle) {
            Some(rel) => start + rel,
            None => break,
        };
        let hit_end = hit + needle.len();
        let from = back_chars(text, hit, WINDOW_CHARS);
        let to = forward_chars(text, hit_end, WINDOW_CHARS);

        chars_before += text[counted..hit].chars().count();
        counted = hit;

        matches.push(MatchExcerpt {
            text: text[from..to].to_string(),
            location: LocationHint::new(chars_before, total_chars),
        });
        // Advance past the hit only; neighbouring windows may overlap.
        start = hit_end;
    }
    matches
}

/// Byte offset `n` characters before `idx`, clamped to the start.
fn back_chars(text: &str, idx: usize, n: usize) -> usize {
    if n == 0 {
        return idx;
    }
    text[..idx]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map_or(0, |(i, _)| i)
}

/// Byte offset `n` characters after `idx`, clamped to the end.
fn forward_chars(text: &str, idx: usize, n: usize) -> usize {
    text[idx..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| idx + i)
}
