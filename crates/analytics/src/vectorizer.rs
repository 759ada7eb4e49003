//! N-gram command vocabulary and tf-idf sparse vectors.
//!
//! The vocabulary is the only state shared across runs. It is grown
//! under single-writer access before parallel extraction starts
//! ("freeze-then-extract"), then read immutably for the rest of the
//! run, and persisted atomically at run end.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::VocabularyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub index: usize,
    pub document_frequency: u64,
}

/// Persistent n-gram token map. Deterministically ordered (BTreeMap)
/// so the fingerprint is stable across runs and platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandVocabulary {
    tokens: BTreeMap<String, TokenEntry>,
    next_index: usize,
    documents_seen: u64,
}

impl CommandVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn documents_seen(&self) -> u64 {
        self.documents_seen
    }

    pub fn get(&self, token: &str) -> Option<TokenEntry> {
        self.tokens.get(token).copied()
    }

    /// Ingest one command (a "document"), growing the vocabulary up to
    /// `config.max_size`. Past the cap, unseen tokens are dropped;
    /// known tokens still update document frequency.
    pub fn observe(&mut self, command: &str, config: &VocabularyConfig) {
        let grams = ngrams(command, config.ngram_min, config.ngram_max);
        if grams.is_empty() {
            return;
        }
        self.documents_seen += 1;

        let mut seen_this_doc: Vec<&str> = Vec::with_capacity(grams.len());
        for gram in &grams {
            if seen_this_doc.contains(&gram.as_str()) {
                continue;
            }
            seen_this_doc.push(gram.as_str());

            if let Some(entry) = self.tokens.get_mut(gram.as_str()) {
                entry.document_frequency += 1;
            } else if self.tokens.len() < config.max_size {
                let index = self.next_index;
                self.next_index += 1;
                self.tokens.insert(
                    gram.clone(),
                    TokenEntry {
                        index,
                        document_frequency: 1,
                    },
                );
            }
            // else: at capacity, out-of-vocabulary token dropped.
        }
    }

    /// Monotonic content fingerprint over the token set and counts.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.documents_seen.to_be_bytes());
        for (token, entry) in &self.tokens {
            hasher.update(token.as_bytes());
            hasher.update([0u8]);
            hasher.update((entry.index as u64).to_be_bytes());
            hasher.update(entry.document_frequency.to_be_bytes());
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

/// Sparse vector, entries sorted by token index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let mut sum = 0.0;
        let mut a = self.entries.iter().peekable();
        let mut b = other.entries.iter().peekable();
        while let (Some(&&(ia, wa)), Some(&&(ib, wb))) = (a.peek(), b.peek()) {
            match ia.cmp(&ib) {
                std::cmp::Ordering::Less => {
                    a.next();
                }
                std::cmp::Ordering::Greater => {
                    b.next();
                }
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    a.next();
                    b.next();
                }
            }
        }
        sum
    }

    /// Cosine distance in [0,1] for non-negative weights. Two empty
    /// vectors are identical; empty vs non-empty is maximally distant.
    pub fn cosine_distance(&self, other: &SparseVector) -> f64 {
        let na = self.norm();
        let nb = other.norm();
        if na <= 0.0 && nb <= 0.0 {
            return 0.0;
        }
        if na <= 0.0 || nb <= 0.0 {
            return 1.0;
        }
        (1.0 - self.dot(other) / (na * nb)).clamp(0.0, 1.0)
    }
}

/// Read-only vectorizer over a frozen vocabulary snapshot.
///
/// Contract: input text must already be canonical (normalized,
/// non-defanged); see the normalization property test for the
/// equivalence this relies on.
pub struct CommandVectorizer<'v> {
    vocabulary: &'v CommandVocabulary,
    config: &'v VocabularyConfig,
}

impl<'v> CommandVectorizer<'v> {
    pub fn new(vocabulary: &'v CommandVocabulary, config: &'v VocabularyConfig) -> Self {
        Self { vocabulary, config }
    }

    /// Term-frequency (optionally idf-weighted) sparse vector for one
    /// command. Out-of-vocabulary tokens contribute zero weight.
    pub fn vectorize(&self, command: &str) -> SparseVector {
        self.vectorize_all(std::slice::from_ref(&command.to_string()))
    }

    /// Vectorize a command sequence as one document.
    pub fn vectorize_all(&self, commands: &[String]) -> SparseVector {
        let mut counts: BTreeMap<usize, (f64, u64)> = BTreeMap::new();
        let mut total = 0u64;
        for command in commands {
            for gram in ngrams(command, self.config.ngram_min, self.config.ngram_max) {
                total += 1;
                if let Some(entry) = self.vocabulary.get(&gram) {
                    let slot = counts.entry(entry.index).or_insert((0.0, entry.document_frequency));
                    slot.0 += 1.0;
                }
            }
        }
        if total == 0 {
            return SparseVector::default();
        }

        let docs = self.vocabulary.documents_seen().max(1) as f64;
        let entries = counts
            .into_iter()
            .map(|(index, (count, df))| {
                let tf = count / total as f64;
                let weight = if self.config.use_idf {
                    // Smoothed idf: ln((1+N)/(1+df)) + 1, never negative.
                    tf * (((1.0 + docs) / (1.0 + df as f64)).ln() + 1.0)
                } else {
                    tf
                };
                (index, weight)
            })
            .collect();
        SparseVector { entries }
    }
}

/// Whitespace-tokenized n-grams of `command`, joined with single
/// spaces, for n in `min..=max`.
fn ngrams(command: &str, min: usize, max: usize) -> Vec<String> {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for n in min..=max {
        if n == 0 || n > tokens.len() {
            continue;
        }
        for window in tokens.windows(n) {
            out.push(window.join(" "));
        }
    }
    out
}

#[cfg(test)]
mod tests;
