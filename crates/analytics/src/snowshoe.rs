//! Snowshoe detection: many sources, few attempts each.
//!
//! Single-pass pipeline over one window: volume analysis, temporal
//! clustering, geographic diversity and colocation, behavioral
//! similarity, password intelligence, then scoring. Every stage is skippable when its
//! minimum sample size is not met; a skipped stage contributes `None`
//! to the scorer (triggering weight renormalization), not a zero.
//!
//! All clustering here runs over per-source entities with
//! `min_points >= 2`, so a window with one distinct source IP can
//! never assemble a cluster — the single-source case is excluded
//! structurally, not special-cased.

use std::collections::BTreeMap;

use tracing::debug;

use crate::capability::BackendCapabilities;
use crate::cluster::{ClusterPoint, ClusteringEngine, Coord};
use crate::config::{ScoringConfig, SnowshoeConfig};
use crate::features::{aggregate, BehavioralFeatureVector, EntityFeatures};
use crate::information::{log1p_norm, normalized_count_entropy, ratio};
use crate::scoring::ScoringEngine;
use crate::types::{
    ClusterParams, Detection, DetectionKind, DetectionPayload, QualityCounters, SessionRecord,
    Severity, Verdict,
};

#[derive(Debug, Clone)]
pub struct SnowshoeOutcome {
    pub detections: Vec<Detection>,
    pub confidence: f64,
    pub verdict: Verdict,
    pub indicator_scores: Vec<(String, f64)>,
    pub skipped_indicators: Vec<String>,
    pub quality: QualityCounters,
}

pub struct SnowshoeDetector<'c> {
    config: &'c SnowshoeConfig,
    scoring: &'c ScoringConfig,
    capabilities: BackendCapabilities,
    memory_budget_bytes: usize,
}

impl<'c> SnowshoeDetector<'c> {
    pub fn new(
        config: &'c SnowshoeConfig,
        scoring: &'c ScoringConfig,
        capabilities: BackendCapabilities,
        memory_budget_bytes: usize,
    ) -> Self {
        Self {
            config,
            scoring,
            capabilities,
            memory_budget_bytes,
        }
    }

    /// Analyze one window. `features[i]` must be the extracted vector
    /// for `sessions[i]`.
    pub fn analyze(
        &self,
        sessions: &[SessionRecord],
        features: &[BehavioralFeatureVector],
    ) -> SnowshoeOutcome {
        debug_assert_eq!(sessions.len(), features.len());

        let mut quality = QualityCounters::default();

        // Group sessions by source IP; BTreeMap keeps entity order
        // deterministic.
        let mut by_ip: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, session) in sessions.iter().enumerate() {
            by_ip.entry(session.source_ip.as_str()).or_default().push(i);
        }
        let distinct_ips = by_ip.len();

        // Per-source aggregated entities for the behavioral stage.
        let entities: Vec<EntityFeatures<'_>> = by_ip
            .iter()
            .map(|(ip, idxs)| {
                let per_session: Vec<EntityFeatures<'_>> = idxs
                    .iter()
                    .map(|&i| EntityFeatures {
                        entity_id: sessions[i].session_id.clone(),
                        vector: features[i].clone(),
                        sessions: vec![&sessions[i]],
                    })
                    .collect();
                EntityFeatures {
                    entity_id: ip.to_string(),
                    vector: aggregate(&per_session),
                    sessions: idxs.iter().map(|&i| &sessions[i]).collect(),
                }
            })
            .collect();

        let engine = ClusteringEngine::new(self.capabilities, self.memory_budget_bytes);

        let volume = self.volume_indicator(&by_ip);
        let (temporal, temporal_ips) = self.temporal_indicator(&engine, &entities);
        let (geographic, geographic_ips) = self.geographic_indicator(&engine, &entities);
        let (behavioral, behavioral_ips) = self.behavioral_indicator(&engine, &entities);
        let password_intel = self.password_indicator(&entities);

        let indicators = BTreeMap::from([
            ("volume".to_string(), volume),
            ("temporal".to_string(), temporal),
            ("geographic".to_string(), geographic),
            ("behavioral".to_string(), behavioral),
            ("password_intel".to_string(), password_intel),
        ]);

        let scorer = ScoringEngine::new(
            &self.scoring.snowshoe_weights,
            self.scoring.credential_stuffing_threshold,
            self.scoring.targeted_attack_threshold,
        );
        let outcome = scorer.score(&indicators);
        quality.skipped_indicators += outcome.skipped.len() as u64;

        debug!(
            distinct_ips,
            confidence = outcome.confidence,
            verdict = outcome.verdict.as_str(),
            skipped = outcome.skipped.len(),
            "snowshoe scoring complete"
        );

        // Evidence comes from sources that landed in a temporal,
        // geographic, or behavioral cluster. Clustering runs over
        // per-source entities with min_points >= 2, so a single-source
        // window has no cluster members and can never emit a detection,
        // whatever the remaining indicators say.
        let mut source_ips: Vec<String> = entities
            .iter()
            .filter(|e| {
                temporal_ips.contains(&e.entity_id)
                    || geographic_ips.contains(&e.entity_id)
                    || behavioral_ips.contains(&e.entity_id)
            })
            .map(|e| e.entity_id.clone())
            .collect();
        source_ips.sort();

        let mut detections = Vec::new();
        if outcome.confidence >= self.config.detection_threshold && !source_ips.is_empty() {
            let mut session_ids: Vec<String> = entities
                .iter()
                .filter(|e| source_ips.binary_search(&e.entity_id).is_ok())
                .flat_map(|e| e.sessions.iter().map(|s| s.session_id.clone()))
                .collect();
            session_ids.sort();
            session_ids.dedup();

            detections.push(Detection {
                kind: DetectionKind::SnowshoeCluster,
                confidence: outcome.confidence,
                severity: Severity::from_confidence(outcome.confidence),
                payload: DetectionPayload::SnowshoeCluster {
                    source_ips,
                    indicator_scores: outcome.contributions.clone(),
                    skipped_indicators: outcome.skipped.clone(),
                    verdict: outcome.verdict,
                },
                session_ids,
            });
        }

        SnowshoeOutcome {
            detections,
            confidence: outcome.confidence,
            verdict: outcome.verdict,
            indicator_scores: outcome.contributions,
            skipped_indicators: outcome.skipped,
            quality,
        }
    }

    /// Spread-across-sources score: how much of the window's traffic
    /// comes from sources at or below the low-volume threshold, scaled
    /// by how many sources there are.
    fn volume_indicator(&self, by_ip: &BTreeMap<&str, Vec<usize>>) -> Option<f64> {
        if by_ip.len() < 2 {
            return None;
        }
        let low_volume = by_ip
            .values()
            .filter(|sessions| sessions.len() <= self.config.low_volume_max_sessions)
            .count();
        let low_fraction = ratio(low_volume as f64, by_ip.len() as f64);
        let breadth = log1p_norm(by_ip.len() as f64, self.config.volume_source_scale as f64);
        Some(low_fraction * breadth)
    }

    /// Fraction of sources whose activity clusters in time with other
    /// sources.
    fn temporal_indicator(
        &self,
        engine: &ClusteringEngine,
        entities: &[EntityFeatures<'_>],
    ) -> (Option<f64>, Vec<String>) {
        if entities.len() < 2 {
            return (None, Vec::new());
        }
        let points: Vec<ClusterPoint> = entities
            .iter()
            .map(|e| ClusterPoint {
                entity_id: e.entity_id.clone(),
                coord: Coord::Time(median_start(&e.sessions)),
            })
            .collect();
        let assignments = engine.cluster(
            &points,
            ClusterParams {
                epsilon: self.config.temporal_epsilon_secs,
                min_points: self.config.temporal_min_points,
            },
            None,
        );
        let clustered: Vec<String> = assignments
            .iter()
            .filter(|a| !a.label.is_noise())
            .map(|a| a.entity_id.clone())
            .collect();
        let score = ratio(clustered.len() as f64, entities.len() as f64);
        (Some(score), clustered)
    }

    /// Country diversity blended with physical spread, over sources.
    /// Sources colocated within one hosting region additionally cluster
    /// under the haversine metric and count as campaign evidence.
    fn geographic_indicator(
        &self,
        engine: &ClusteringEngine,
        entities: &[EntityFeatures<'_>],
    ) -> (Option<f64>, Vec<String>) {
        if entities.len() < self.config.min_geographic_ips {
            return (None, Vec::new());
        }
        let mut countries: BTreeMap<&str, u64> = BTreeMap::new();
        for entity in entities {
            for session in &entity.sessions {
                if let Some(country) = session.enrichment.country.as_deref() {
                    *countries.entry(country).or_insert(0) += 1;
                }
            }
        }
        if countries.is_empty() {
            return (None, Vec::new());
        }
        let diversity = normalized_count_entropy(countries.values().copied());

        // One representative coordinate per source.
        let located: Vec<(&str, f64, f64)> = entities
            .iter()
            .filter_map(|e| {
                e.sessions.iter().find_map(|s| {
                    match (s.enrichment.latitude, s.enrichment.longitude) {
                        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                            Some((e.entity_id.as_str(), lat, lon))
                        }
                        _ => None,
                    }
                })
            })
            .collect();

        // Physical spread across sources: widest pairwise distance.
        let mut max_km = 0.0f64;
        for (i, &(_, lat1, lon1)) in located.iter().enumerate() {
            for &(_, lat2, lon2) in &located[i + 1..] {
                max_km = max_km.max(crate::information::haversine_km(lat1, lon1, lat2, lon2));
            }
        }
        let spread = log1p_norm(max_km, 20_000.0);

        let points: Vec<ClusterPoint> = located
            .iter()
            .map(|&(id, lat, lon)| ClusterPoint {
                entity_id: id.to_string(),
                coord: Coord::Geo { lat, lon },
            })
            .collect();
        let assignments = engine.cluster(
            &points,
            ClusterParams {
                epsilon: self.config.geographic_epsilon_km,
                min_points: self.config.geographic_min_points,
            },
            None,
        );
        let clustered: Vec<String> = assignments
            .iter()
            .filter(|a| !a.label.is_noise())
            .map(|a| a.entity_id.clone())
            .collect();

        (Some(0.6 * diversity + 0.4 * spread), clustered)
    }

    /// Fraction of sources whose aggregated behavior clusters with
    /// other sources under cosine distance.
    fn behavioral_indicator(
        &self,
        engine: &ClusteringEngine,
        entities: &[EntityFeatures<'_>],
    ) -> (Option<f64>, Vec<String>) {
        if entities.len() < self.config.min_behavioral_ips {
            return (None, Vec::new());
        }
        let points: Vec<ClusterPoint> = entities
            .iter()
            .map(|e| ClusterPoint {
                entity_id: e.entity_id.clone(),
                coord: Coord::Dense(e.vector.values.to_vec()),
            })
            .collect();
        let assignments = engine.cluster(
            &points,
            ClusterParams {
                epsilon: self.config.behavioral_epsilon,
                min_points: self.config.behavioral_min_points,
            },
            None,
        );
        let clustered: Vec<String> = assignments
            .iter()
            .filter(|a| !a.label.is_noise())
            .map(|a| a.entity_id.clone())
            .collect();
        let score = ratio(clustered.len() as f64, entities.len() as f64);
        (Some(score), clustered)
    }

    /// Pooled breach ratio over sessions that carry breach statistics.
    fn password_indicator(&self, entities: &[EntityFeatures<'_>]) -> Option<f64> {
        let mut breached = 0u64;
        let mut attempts = 0u64;
        for entity in entities {
            for session in &entity.sessions {
                if let Some(count) = session.enrichment.breached_passwords {
                    breached += count;
                    attempts += session.auth_attempts.len() as u64;
                }
            }
        }
        if attempts < self.config.min_auth_attempts as u64 || attempts == 0 {
            return None;
        }
        Some(ratio(breached as f64, attempts as f64))
    }
}

fn median_start(sessions: &[&SessionRecord]) -> i64 {
    let mut starts: Vec<i64> = sessions.iter().map(|s| s.start_ts_unix).collect();
    starts.sort_unstable();
    starts[starts.len() / 2]
}
