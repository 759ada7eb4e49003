//! Run orchestration: capability probe, vocabulary freeze, parallel
//! feature extraction, detector execution, and atomic persistence.
//!
//! A run is atomic per window: cancellation or a persistence failure
//! discards everything computed so far and leaves previously-committed
//! state untouched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use store::KeyValueStore;
use tracing::{info, warn};

use crate::capability::{self, BackendCapabilities, CapabilityProbe};
use crate::checkpoint::CheckpointManager;
use crate::cluster::ClusteringEngine;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, RunResult};
use crate::features::{self, BehavioralFeatureVector, FEATURE_COUNT};
use crate::longtail::LongtailAnalyzer;
use crate::snowshoe::SnowshoeDetector;
use crate::types::{
    AnalysisResult, Detection, QualityCounters, RunMetrics, SessionRecord, Verdict,
};
use crate::vectorizer::CommandVocabulary;

const VOCABULARY_KEY: &str = "vocabulary/commands";

/// Cooperative cancellation, checked at sub-detector boundaries.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct AnalysisRunner<'s> {
    config: AnalysisConfig,
    store: &'s dyn KeyValueStore,
    capabilities: BackendCapabilities,
    cancel: CancelFlag,
}

impl<'s> AnalysisRunner<'s> {
    /// Validates configuration (fail-fast) and probes storage
    /// capabilities once; the descriptor is fixed for this runner's
    /// lifetime.
    pub fn new(
        config: AnalysisConfig,
        store: &'s dyn KeyValueStore,
        probe: &dyn CapabilityProbe,
    ) -> RunResult<Self> {
        config.validate()?;
        let capabilities = capability::detect(probe);
        Ok(Self {
            config,
            store,
            capabilities,
            cancel: CancelFlag::new(),
        })
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Snowshoe analysis over one window of enriched sessions.
    pub fn run_snowshoe(&self, sessions: &[SessionRecord]) -> RunResult<AnalysisResult> {
        let started = Instant::now();
        let (window_start, window_end) = window_bounds(sessions);

        // Snowshoe does not grow the vocabulary; the loaded fingerprint
        // still keys the checkpoint.
        let vocabulary = self.load_vocabulary()?;
        let fingerprint = vocabulary.fingerprint();

        let checkpoints = CheckpointManager::new(self.store);
        let result_key = result_key("snowshoe", window_start, window_end);
        let candidate = CheckpointManager::candidate(
            window_start,
            window_end,
            fingerprint,
            sessions.len(),
            result_key,
        );
        if let Some(result) = checkpoints.try_skip("checkpoints/snowshoe", &candidate)? {
            return Ok(result);
        }

        self.check_cancelled()?;
        let features = extract_all(sessions);
        let mut quality = merge_feature_quality(&features);

        self.check_cancelled()?;
        let detector = SnowshoeDetector::new(
            &self.config.snowshoe,
            &self.config.scoring,
            self.capabilities,
            self.config.memory_budget_bytes,
        );
        let outcome = detector.analyze(sessions, &features);
        quality.merge(outcome.quality);

        let result = self.build_result(
            sessions,
            window_start,
            window_end,
            outcome.detections,
            outcome.confidence,
            outcome.verdict,
            snowshoe_recommendation(outcome.verdict, outcome.confidence),
            quality,
            started,
        );

        self.check_cancelled()?;
        checkpoints.commit("checkpoints/snowshoe", &candidate, &result)?;
        info!(
            window_start,
            window_end,
            sessions = sessions.len(),
            confidence = result.overall_confidence,
            verdict = result.verdict.as_str(),
            "snowshoe run committed"
        );
        Ok(result)
    }

    /// Longtail analysis over one window of enriched sessions.
    pub fn run_longtail(&self, sessions: &[SessionRecord]) -> RunResult<AnalysisResult> {
        let started = Instant::now();
        let (window_start, window_end) = window_bounds(sessions);

        // The skip check runs against the vocabulary as persisted: a
        // committed checkpoint always carries the fingerprint of the
        // at-rest vocabulary, so re-running an unchanged window matches
        // before any growth happens.
        let mut vocabulary = self.load_vocabulary()?;
        let checkpoints = CheckpointManager::new(self.store);
        let result_key = result_key("longtail", window_start, window_end);
        let at_rest = CheckpointManager::candidate(
            window_start,
            window_end,
            vocabulary.fingerprint(),
            sessions.len(),
            result_key.clone(),
        );
        if let Some(result) = checkpoints.try_skip("checkpoints/longtail", &at_rest)? {
            return Ok(result);
        }

        // Single-writer growth phase, then the vocabulary is frozen for
        // the rest of the run.
        for session in sessions {
            for command in &session.commands {
                vocabulary.observe(command, &self.config.vocabulary);
            }
        }
        let candidate = CheckpointManager::candidate(
            window_start,
            window_end,
            vocabulary.fingerprint(),
            sessions.len(),
            result_key,
        );

        self.check_cancelled()?;
        let features = extract_all(sessions);
        let mut quality = merge_feature_quality(&features);

        self.check_cancelled()?;
        let analyzer = LongtailAnalyzer::new(
            &self.config.longtail,
            &self.config.vocabulary,
            &self.config.scoring,
            self.capabilities,
            self.config.memory_budget_bytes,
        );
        let outcome = analyzer.analyze(sessions, &features, &vocabulary, window_end);
        quality.merge(outcome.quality);

        let verdict = if outcome.confidence > self.config.scoring.targeted_attack_threshold {
            Verdict::Hybrid
        } else {
            Verdict::Benign
        };
        let result = self.build_result(
            sessions,
            window_start,
            window_end,
            outcome.detections,
            outcome.confidence,
            verdict,
            longtail_recommendation(outcome.confidence),
            quality,
            started,
        );

        self.check_cancelled()?;
        // Vocabulary first: the checkpoint's fingerprint must never
        // reference vocabulary state that was not persisted.
        self.save_vocabulary(&vocabulary)?;
        checkpoints.commit("checkpoints/longtail", &candidate, &result)?;
        info!(
            window_start,
            window_end,
            sessions = sessions.len(),
            detections = result.detections.len(),
            vocabulary_tokens = vocabulary.len(),
            "longtail run committed"
        );
        Ok(result)
    }

    fn check_cancelled(&self) -> RunResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(())
    }

    fn load_vocabulary(&self) -> RunResult<CommandVocabulary> {
        match self.store.get(VOCABULARY_KEY)? {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(vocabulary) => Ok(vocabulary),
                Err(err) => {
                    warn!(error = %err, "unreadable vocabulary, starting fresh");
                    Ok(CommandVocabulary::new())
                }
            },
            None => Ok(CommandVocabulary::new()),
        }
    }

    fn save_vocabulary(&self, vocabulary: &CommandVocabulary) -> RunResult<()> {
        let bytes = serde_json::to_vec(vocabulary)?;
        self.store.put_atomic(VOCABULARY_KEY, &bytes)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_result(
        &self,
        sessions: &[SessionRecord],
        window_start: i64,
        window_end: i64,
        detections: Vec<Detection>,
        confidence: f64,
        verdict: Verdict,
        recommendation: String,
        quality: QualityCounters,
        started: Instant,
    ) -> AnalysisResult {
        let mut detection_counts: BTreeMap<String, usize> = BTreeMap::new();
        for detection in &detections {
            *detection_counts
                .entry(detection.kind.as_str().to_string())
                .or_insert(0) += 1;
        }

        let events = sessions.len();
        let engine = ClusteringEngine::new(self.capabilities, self.config.memory_budget_bytes);
        let possible = (events * FEATURE_COUNT).max(1) as f64;
        let degraded = (quality.clamped_features + quality.unavailable_signals) as f64;
        let data_quality_score = (1.0 - degraded / possible).clamp(0.0, 1.0);

        AnalysisResult {
            window_start_unix: window_start,
            window_end_unix: window_end,
            baseline_days: self.config.longtail.baseline_days,
            detection_counts,
            overall_confidence: confidence,
            verdict,
            recommendation,
            metrics: RunMetrics {
                events_analyzed: events,
                duration_ms: started.elapsed().as_millis() as u64,
                estimated_memory_bytes: engine.planned_memory_bytes(events),
                data_quality_score,
            },
            quality,
            detections,
            from_checkpoint: false,
        }
    }
}

fn window_bounds(sessions: &[SessionRecord]) -> (i64, i64) {
    let start = sessions.iter().map(|s| s.start_ts_unix).min().unwrap_or(0);
    let end = sessions.iter().map(|s| s.end_ts_unix).max().unwrap_or(0);
    (start, end)
}

fn result_key(kind: &str, window_start: i64, window_end: i64) -> String {
    format!("results/{}/{}-{}", kind, window_start, window_end)
}

fn merge_feature_quality(features: &[BehavioralFeatureVector]) -> QualityCounters {
    let mut quality = QualityCounters::default();
    for vector in features {
        quality.merge(vector.quality);
    }
    quality
}

/// Per-session extraction is pure and embarrassingly parallel; chunks
/// are merged back in input order so downstream ordering never depends
/// on scheduling.
pub(crate) fn extract_all(sessions: &[SessionRecord]) -> Vec<BehavioralFeatureVector> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if workers <= 1 || sessions.len() < 256 {
        return sessions.iter().map(features::extract).collect();
    }

    let chunk_size = sessions.len().div_ceil(workers);
    let mut out: Vec<Vec<BehavioralFeatureVector>> = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = sessions
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(features::extract).collect()))
            .collect();
        for handle in handles {
            // A panic in extraction is a bug; propagate it.
            out.push(handle.join().expect("feature extraction worker panicked"));
        }
    });
    out.into_iter().flatten().collect()
}

fn snowshoe_recommendation(verdict: Verdict, confidence: f64) -> String {
    match verdict {
        Verdict::CredentialStuffing => format!(
            "Distributed credential-stuffing activity (confidence {:.2}). \
             Review per-source thresholds; block listed sources as a set, not individually.",
            confidence
        ),
        Verdict::Hybrid => format!(
            "Mixed distributed activity (confidence {:.2}). \
             Correlate listed sources before acting.",
            confidence
        ),
        Verdict::TargetedAttack => format!(
            "Activity consistent with targeted probing (confidence {:.2}). \
             Standard per-source controls apply.",
            confidence
        ),
        Verdict::Benign => "No coordinated low-volume activity detected.".to_string(),
    }
}

fn longtail_recommendation(confidence: f64) -> String {
    if confidence >= 0.7 {
        format!(
            "Multiple longtail categories firing (confidence {:.2}); triage rare and emerging findings first.",
            confidence
        )
    } else if confidence > 0.0 {
        format!(
            "Scattered longtail findings (confidence {:.2}); review individually.",
            confidence
        )
    } else {
        "No longtail anomalies detected.".to_string()
    }
}
