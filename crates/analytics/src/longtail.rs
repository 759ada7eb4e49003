//! Longtail analysis: five independent sub-detectors over one window.
//!
//! Rare commands, anomalous command sequences, behavioral outliers,
//! emerging patterns, and high-entropy payloads each produce zero or
//! more detections; their per-category scores are merged through the
//! same weighted scoring mechanism the snowshoe detector uses. A
//! sub-detector that lacks the samples to run contributes `None`
//! (renormalized away), while one that ran and found nothing
//! contributes 0.0.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::capability::BackendCapabilities;
use crate::cluster::{ClusterPoint, ClusteringEngine, Coord};
use crate::config::{LongtailConfig, ScoringConfig, VocabularyConfig};
use crate::features::BehavioralFeatureVector;
use crate::information::{clamp01, cosine_distance, normalized_char_entropy, percentile_sorted};
use crate::scoring::ScoringEngine;
use crate::types::{
    ClusterParams, Detection, DetectionKind, DetectionPayload, QualityCounters, SessionRecord,
    Severity,
};
use crate::vectorizer::{CommandVectorizer, CommandVocabulary, SparseVector};

#[derive(Debug, Clone)]
pub struct LongtailOutcome {
    pub detections: Vec<Detection>,
    pub confidence: f64,
    pub category_scores: Vec<(String, f64)>,
    pub skipped_categories: Vec<String>,
    pub quality: QualityCounters,
}

pub struct LongtailAnalyzer<'c> {
    config: &'c LongtailConfig,
    vocab_config: &'c VocabularyConfig,
    scoring: &'c ScoringConfig,
    capabilities: BackendCapabilities,
    memory_budget_bytes: usize,
}

impl<'c> LongtailAnalyzer<'c> {
    pub fn new(
        config: &'c LongtailConfig,
        vocab_config: &'c VocabularyConfig,
        scoring: &'c ScoringConfig,
        capabilities: BackendCapabilities,
        memory_budget_bytes: usize,
    ) -> Self {
        Self {
            config,
            vocab_config,
            scoring,
            capabilities,
            memory_budget_bytes,
        }
    }

    /// Analyze one window. `features[i]` must be the extracted vector
    /// for `sessions[i]`; `vocabulary` is the frozen run snapshot.
    pub fn analyze(
        &self,
        sessions: &[SessionRecord],
        features: &[BehavioralFeatureVector],
        vocabulary: &CommandVocabulary,
        window_end_unix: i64,
    ) -> LongtailOutcome {
        debug_assert_eq!(sessions.len(), features.len());
        let mut quality = QualityCounters::default();

        let rare = self.rare_commands(sessions);
        let sequences = self.anomalous_sequences(sessions, vocabulary);
        let outliers = self.behavioral_outliers(sessions, features);
        let emerging = self.emerging_patterns(sessions, window_end_unix);
        let entropy = self.high_entropy_payloads(sessions);

        let mut detections = Vec::new();
        let mut indicators: BTreeMap<String, Option<f64>> = BTreeMap::new();
        for (name, result) in [
            ("rare_command", rare),
            ("anomalous_sequence", sequences),
            ("behavioral_outlier", outliers),
            ("emerging_pattern", emerging),
            ("high_entropy_payload", entropy),
        ] {
            match result {
                Some(mut found) => {
                    sort_category(&mut found);
                    let score = found.iter().map(|d| d.confidence).fold(0.0, f64::max);
                    indicators.insert(name.to_string(), Some(score));
                    detections.extend(found);
                }
                None => {
                    indicators.insert(name.to_string(), None);
                }
            }
        }

        let scorer = ScoringEngine::new(
            &self.scoring.longtail_weights,
            self.scoring.credential_stuffing_threshold,
            self.scoring.targeted_attack_threshold,
        );
        let outcome = scorer.score(&indicators);
        quality.skipped_indicators += outcome.skipped.len() as u64;

        debug!(
            detections = detections.len(),
            confidence = outcome.confidence,
            skipped = outcome.skipped.len(),
            "longtail analysis complete"
        );

        LongtailOutcome {
            detections,
            confidence: outcome.confidence,
            category_scores: outcome.contributions,
            skipped_categories: outcome.skipped,
            quality,
        }
    }

    /// Commands at or below the bottom rarity percentile of the
    /// frequency distribution, guarded by an absolute share bound so a
    /// command carrying half the corpus can never be "rare".
    fn rare_commands(&self, sessions: &[SessionRecord]) -> Option<Vec<Detection>> {
        let mut counts: BTreeMap<&str, (u64, BTreeSet<&str>)> = BTreeMap::new();
        let mut corpus_total = 0u64;
        for session in sessions {
            for command in &session.commands {
                corpus_total += 1;
                let entry = counts.entry(command.as_str()).or_default();
                entry.0 += 1;
                entry.1.insert(session.session_id.as_str());
            }
        }
        if (corpus_total as usize) < self.config.min_command_corpus || counts.len() < 2 {
            return None;
        }

        let mut sorted: Vec<f64> = counts.values().map(|(c, _)| *c as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let threshold = percentile_sorted(&sorted, self.config.rarity_percentile);
        let max_share = self.config.rarity_percentile / 100.0;

        let mut out = Vec::new();
        for (command, (count, session_ids)) in &counts {
            let share = *count as f64 / corpus_total as f64;
            if *count as f64 > threshold || share > max_share {
                continue;
            }
            let rarity = 1.0 - share;
            out.push(Detection {
                kind: DetectionKind::RareCommand,
                confidence: rarity,
                severity: Severity::from_confidence(rarity),
                payload: DetectionPayload::RareCommand {
                    command: (*command).to_string(),
                    count: *count,
                    corpus_size: corpus_total,
                    rarity,
                },
                session_ids: session_ids.iter().map(|s| (*s).to_string()).collect(),
            });
        }
        Some(out)
    }

    /// Sliding command windows whose nearest neighbor (cosine, via the
    /// command vectorizer) is farther than the configured threshold.
    fn anomalous_sequences(
        &self,
        sessions: &[SessionRecord],
        vocabulary: &CommandVocabulary,
    ) -> Option<Vec<Detection>> {
        let vectorizer = CommandVectorizer::new(vocabulary, self.vocab_config);
        let n = self.config.sequence_length;

        struct Window<'a> {
            session_id: &'a str,
            window_index: usize,
            commands: &'a [String],
            vector: SparseVector,
        }

        let mut windows: Vec<Window<'_>> = Vec::new();
        for session in sessions {
            if session.commands.len() < n {
                continue;
            }
            for (window_index, chunk) in session.commands.windows(n).enumerate() {
                windows.push(Window {
                    session_id: &session.session_id,
                    window_index,
                    commands: chunk,
                    vector: vectorizer.vectorize_all(chunk),
                });
            }
        }
        if windows.len() < self.config.min_sequence_windows {
            return None;
        }

        let mut out = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            let mut nearest = f64::INFINITY;
            for (j, other) in windows.iter().enumerate() {
                if i == j {
                    continue;
                }
                let d = window.vector.cosine_distance(&other.vector);
                if d < nearest {
                    nearest = d;
                }
            }
            if nearest > self.config.sequence_distance_threshold {
                let confidence = clamp01(nearest);
                out.push(Detection {
                    kind: DetectionKind::AnomalousSequence,
                    confidence,
                    severity: Severity::from_confidence(confidence),
                    payload: DetectionPayload::AnomalousSequence {
                        session_id: window.session_id.to_string(),
                        window_index: window.window_index,
                        commands: window.commands.to_vec(),
                        nearest_distance: nearest,
                    },
                    session_ids: vec![window.session_id.to_string()],
                });
            }
        }
        Some(out)
    }

    /// DBSCAN noise over per-session behavioral vectors.
    fn behavioral_outliers(
        &self,
        sessions: &[SessionRecord],
        features: &[BehavioralFeatureVector],
    ) -> Option<Vec<Detection>> {
        if sessions.len() < self.config.min_outlier_sessions {
            return None;
        }
        let engine = ClusteringEngine::new(self.capabilities, self.memory_budget_bytes);
        let points: Vec<ClusterPoint> = sessions
            .iter()
            .zip(features)
            .map(|(session, vector)| ClusterPoint {
                entity_id: session.session_id.clone(),
                coord: Coord::Dense(vector.values.to_vec()),
            })
            .collect();
        let params = ClusterParams {
            epsilon: self.config.behavioral_epsilon,
            min_points: self.config.behavioral_min_points,
        };
        let assignments = engine.cluster(&points, params, None);

        let mut out = Vec::new();
        for (i, assignment) in assignments.iter().enumerate() {
            if !assignment.label.is_noise() {
                continue;
            }
            let mut nearest = f64::INFINITY;
            for (j, other) in features.iter().enumerate() {
                if i == j {
                    continue;
                }
                let d = cosine_distance(&features[i].values, &other.values);
                if d < nearest {
                    nearest = d;
                }
            }
            if !nearest.is_finite() {
                nearest = 1.0;
            }
            // Confidence grows with how far past epsilon the nearest
            // neighbor sits.
            let confidence = clamp01(0.5 + (nearest - params.epsilon) / (2.0 * params.epsilon));
            out.push(Detection {
                kind: DetectionKind::BehavioralOutlier,
                confidence,
                severity: Severity::from_confidence(confidence),
                payload: DetectionPayload::BehavioralOutlier {
                    session_id: assignment.entity_id.clone(),
                    nearest_distance: nearest,
                    epsilon: params.epsilon,
                    min_points: params.min_points,
                },
                session_ids: vec![assignment.entity_id.clone()],
            });
        }
        Some(out)
    }

    /// Commands whose recent rate is more than twice their baseline
    /// rate, or that are new since the baseline period.
    fn emerging_patterns(
        &self,
        sessions: &[SessionRecord],
        window_end_unix: i64,
    ) -> Option<Vec<Detection>> {
        let cutoff = window_end_unix - i64::from(self.config.baseline_days) * 86_400;

        let mut baseline: BTreeMap<&str, u64> = BTreeMap::new();
        let mut recent: BTreeMap<&str, (u64, BTreeSet<&str>)> = BTreeMap::new();
        let mut baseline_total = 0u64;
        let mut recent_total = 0u64;
        for session in sessions {
            let is_recent = session.start_ts_unix >= cutoff;
            for command in &session.commands {
                if is_recent {
                    recent_total += 1;
                    let entry = recent.entry(command.as_str()).or_default();
                    entry.0 += 1;
                    entry.1.insert(session.session_id.as_str());
                } else {
                    baseline_total += 1;
                    *baseline.entry(command.as_str()).or_insert(0) += 1;
                }
            }
        }
        // Without a baseline period there is nothing to compare against.
        if baseline_total == 0 || recent_total == 0 {
            return None;
        }

        let mut out = Vec::new();
        for (pattern, (recent_count, session_ids)) in &recent {
            if *recent_count < self.config.min_pattern_recent_count {
                continue;
            }
            let baseline_count = baseline.get(pattern).copied().unwrap_or(0);
            let recent_rate = *recent_count as f64 / recent_total as f64;
            let baseline_rate = baseline_count as f64 / baseline_total as f64;

            let (growth, confidence) = if baseline_count == 0 {
                (f64::INFINITY, 0.9)
            } else {
                let growth = recent_rate / baseline_rate;
                if growth <= 2.0 {
                    continue;
                }
                (growth, clamp01(growth / (growth + 2.0)))
            };

            out.push(Detection {
                kind: DetectionKind::EmergingPattern,
                confidence,
                severity: Severity::from_confidence(confidence),
                payload: DetectionPayload::EmergingPattern {
                    pattern: (*pattern).to_string(),
                    baseline_count,
                    recent_count: *recent_count,
                    growth,
                },
                session_ids: session_ids.iter().map(|s| (*s).to_string()).collect(),
            });
        }
        Some(out)
    }

    /// Normalized character entropy over payload text fields. One
    /// detection per session, for its highest-entropy flagged field.
    fn high_entropy_payloads(&self, sessions: &[SessionRecord]) -> Option<Vec<Detection>> {
        let min_len = self.config.min_entropy_len;
        let mut candidates = 0usize;
        let mut out = Vec::new();

        for session in sessions {
            let mut best: Option<(&str, &str, f64)> = None;
            let fields = session
                .commands
                .iter()
                .map(|c| ("command", c.as_str()))
                .chain(
                    session
                        .file_transfers
                        .iter()
                        .map(|t| ("filename", t.filename.as_str())),
                );
            for (field, text) in fields {
                if text.len() < min_len {
                    continue;
                }
                candidates += 1;
                let entropy = normalized_char_entropy(text);
                if entropy >= self.config.entropy_threshold {
                    let better = best.map(|(_, _, e)| entropy > e).unwrap_or(true);
                    if better {
                        best = Some((field, text, entropy));
                    }
                }
            }
            if let Some((field, text, entropy)) = best {
                out.push(Detection {
                    kind: DetectionKind::HighEntropyPayload,
                    confidence: entropy,
                    severity: Severity::from_confidence(entropy),
                    payload: DetectionPayload::HighEntropyPayload {
                        session_id: session.session_id.clone(),
                        field: field.to_string(),
                        entropy,
                        length: text.len(),
                    },
                    session_ids: vec![session.session_id.clone()],
                });
            }
        }

        if candidates == 0 {
            return None;
        }
        Some(out)
    }
}

/// Stable category ordering: severity descending, then first evidence
/// session id ascending.
fn sort_category(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.session_ids.cmp(&b.session_ids))
    });
}

#[cfg(test)]
mod tests;
