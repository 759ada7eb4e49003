//! Honeypot session analytics: snowshoe and longtail detection.
//!
//! The host application feeds a windowed batch of enriched
//! [`SessionRecord`]s into [`AnalysisRunner::run_snowshoe`] and
//! [`AnalysisRunner::run_longtail`]; both return a typed, serializable
//! [`AnalysisResult`]. Persistence and capability probing stay behind
//! the `store` traits, so the core never talks to storage directly.

mod capability;
mod checkpoint;
mod cluster;
mod config;
mod error;
mod features;
mod information;
mod longtail;
mod run;
mod scoring;
mod snowshoe;
mod types;
mod vectorizer;

pub use capability::{detect, BackendCapabilities, CapabilityProbe, NoBackend, ProbeError};
pub use checkpoint::CheckpointManager;
pub use cluster::{ClusterPoint, ClusteringEngine, Coord, VectorIndex};
pub use config::{
    AnalysisConfig, LongtailConfig, ScoringConfig, SnowshoeConfig, VocabularyConfig,
    LONGTAIL_INDICATORS, SNOWSHOE_INDICATORS,
};
pub use error::{AnalysisError, ConfigError, RunResult};
pub use features::{
    aggregate, extract, BehavioralFeatureVector, EntityFeatures, FEATURE_COUNT, FEATURE_NAMES,
};
pub use longtail::{LongtailAnalyzer, LongtailOutcome};
pub use run::{AnalysisRunner, CancelFlag};
pub use scoring::{ScoreOutcome, ScoringEngine};
pub use snowshoe::{SnowshoeDetector, SnowshoeOutcome};
pub use types::{
    AnalysisCheckpoint, AnalysisResult, AuthAttempt, ClusterAssignment, ClusterLabel,
    ClusterParams, Detection, DetectionKind, DetectionPayload, Enrichment, FileTransferEvent,
    QualityCounters, RunMetrics, SessionRecord, Severity, TransferDirection, Verdict,
};
pub use vectorizer::{CommandVectorizer, CommandVocabulary, SparseVector, TokenEntry};

#[cfg(test)]
pub(crate) mod test_support;
