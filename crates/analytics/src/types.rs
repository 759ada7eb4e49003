use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One enriched honeypot session, as produced by the ingestion and
/// enrichment pipeline. Read-only for the duration of an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub source_ip: String,
    pub sensor_id: String,
    pub start_ts_unix: i64,
    pub end_ts_unix: i64,
    /// Canonical (normalized, non-defanged) command lines, in order.
    pub commands: Vec<String>,
    /// Raw command lines as captured, kept for evidence payloads.
    #[serde(default)]
    pub raw_commands: Vec<String>,
    #[serde(default)]
    pub auth_attempts: Vec<AuthAttempt>,
    #[serde(default)]
    pub dst_ports: Vec<u16>,
    #[serde(default)]
    pub bytes_in: u64,
    #[serde(default)]
    pub bytes_out: u64,
    #[serde(default)]
    pub file_transfers: Vec<FileTransferEvent>,
    #[serde(default)]
    pub enrichment: Enrichment,
}

impl SessionRecord {
    pub fn duration_secs(&self) -> f64 {
        self.end_ts_unix.saturating_sub(self.start_ts_unix).max(0) as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthAttempt {
    pub username: String,
    pub password: String,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Download,
    Upload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTransferEvent {
    pub filename: String,
    pub size_bytes: u64,
    pub direction: TransferDirection,
    /// None when no scanner verdict is available for this transfer.
    #[serde(default)]
    pub malware_detected: Option<bool>,
}

/// Enrichment annotations. Every field is optional: an absent feed is
/// "unknown", never "benign" — extraction records the gap in the
/// vector's quality metadata instead of guessing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Enrichment {
    pub country: Option<String>,
    pub asn: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_cloud_provider: Option<bool>,
    pub is_vpn: Option<bool>,
    pub is_tor_exit: Option<bool>,
    /// How many of this session's attempted passwords appear in known
    /// breach corpora.
    pub breached_passwords: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    RareCommand,
    AnomalousSequence,
    BehavioralOutlier,
    EmergingPattern,
    HighEntropyPayload,
    SnowshoeCluster,
}

impl DetectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RareCommand => "rare_command",
            Self::AnomalousSequence => "anomalous_sequence",
            Self::BehavioralOutlier => "behavioral_outlier",
            Self::EmergingPattern => "emerging_pattern",
            Self::HighEntropyPayload => "high_entropy_payload",
            Self::SnowshoeCluster => "snowshoe_cluster",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Band a confidence value into a severity grade.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Self::Critical
        } else if confidence >= 0.7 {
            Self::High
        } else if confidence >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    CredentialStuffing,
    TargetedAttack,
    Hybrid,
    Benign,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CredentialStuffing => "credential_stuffing",
            Self::TargetedAttack => "targeted_attack",
            Self::Hybrid => "hybrid",
            Self::Benign => "benign",
        }
    }
}

/// Kind-specific structured evidence carried by a [`Detection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionPayload {
    RareCommand {
        command: String,
        count: u64,
        corpus_size: u64,
        rarity: f64,
    },
    AnomalousSequence {
        session_id: String,
        window_index: usize,
        commands: Vec<String>,
        nearest_distance: f64,
    },
    BehavioralOutlier {
        session_id: String,
        nearest_distance: f64,
        epsilon: f64,
        min_points: usize,
    },
    EmergingPattern {
        pattern: String,
        baseline_count: u64,
        recent_count: u64,
        growth: f64,
    },
    HighEntropyPayload {
        session_id: String,
        field: String,
        entropy: f64,
        length: usize,
    },
    SnowshoeCluster {
        source_ips: Vec<String>,
        indicator_scores: Vec<(String, f64)>,
        skipped_indicators: Vec<String>,
        verdict: Verdict,
    },
}

/// One typed finding. `session_ids` is always a subset of the analyzed
/// window and is kept sorted for deterministic output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub kind: DetectionKind,
    pub confidence: f64,
    pub severity: Severity,
    pub payload: DetectionPayload,
    pub session_ids: Vec<String>,
}

/// Epsilon / min-points used for a clustering pass, carried on every
/// assignment for reproducibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    pub epsilon: f64,
    pub min_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterLabel {
    Member(u32),
    Noise,
}

impl ClusterLabel {
    pub fn is_noise(self) -> bool {
        matches!(self, Self::Noise)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub entity_id: String,
    pub label: ClusterLabel,
    pub params: ClusterParams,
}

/// Counters for locally-recovered quality issues that never fail a
/// run: clamped out-of-range features, enrichment signals that were
/// structurally unavailable, and scoring indicators skipped for lack of
/// samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCounters {
    pub clamped_features: u64,
    pub unavailable_signals: u64,
    pub skipped_indicators: u64,
}

impl QualityCounters {
    pub fn merge(&mut self, other: QualityCounters) {
        self.clamped_features += other.clamped_features;
        self.unavailable_signals += other.unavailable_signals;
        self.skipped_indicators += other.skipped_indicators;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub events_analyzed: usize,
    pub duration_ms: u64,
    /// Estimated peak working-set bytes for the distance computations.
    pub estimated_memory_bytes: u64,
    /// 1.0 for a fully clean window, degraded by quality counters.
    pub data_quality_score: f64,
}

/// The product of one analysis run over one window. Immutable once
/// returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub window_start_unix: i64,
    pub window_end_unix: i64,
    pub baseline_days: u32,
    /// Per-kind detection counts, keyed by `DetectionKind::as_str`.
    pub detection_counts: BTreeMap<String, usize>,
    pub overall_confidence: f64,
    pub verdict: Verdict,
    pub recommendation: String,
    pub metrics: RunMetrics,
    pub quality: QualityCounters,
    pub detections: Vec<Detection>,
    /// True when this result was served from a checkpoint without
    /// re-executing the detectors.
    #[serde(default)]
    pub from_checkpoint: bool,
}

/// Fingerprint of one completed run, used to skip unchanged windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisCheckpoint {
    pub window_start_unix: i64,
    pub window_end_unix: i64,
    pub vocabulary_fingerprint: String,
    pub session_count: usize,
    /// Store key of the `AnalysisResult` this checkpoint corresponds to.
    pub result_key: String,
}

impl AnalysisCheckpoint {
    /// Whether `other` describes the same input window: identical
    /// bounds, vocabulary fingerprint, and session count.
    pub fn same_input(&self, other: &AnalysisCheckpoint) -> bool {
        self.window_start_unix == other.window_start_unix
            && self.window_end_unix == other.window_end_unix
            && self.vocabulary_fingerprint == other.vocabulary_fingerprint
            && self.session_count == other.session_count
    }
}
