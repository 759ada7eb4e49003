use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Indicator names accepted by the snowshoe scoring pass.
pub const SNOWSHOE_INDICATORS: [&str; 5] = [
    "volume",
    "temporal",
    "geographic",
    "behavioral",
    "password_intel",
];

/// Category names accepted by the longtail aggregate scoring pass.
pub const LONGTAIL_INDICATORS: [&str; 5] = [
    "rare_command",
    "anomalous_sequence",
    "behavioral_outlier",
    "emerging_pattern",
    "high_entropy_payload",
];

/// Fully-resolved analysis configuration. The host sources values from
/// files/env/flags; this core only validates and consumes the struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bound on in-memory distance-matrix construction.
    pub memory_budget_bytes: usize,
    pub snowshoe: SnowshoeConfig,
    pub longtail: LongtailConfig,
    pub vocabulary: VocabularyConfig,
    pub scoring: ScoringConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: 500 * 1024 * 1024,
            snowshoe: SnowshoeConfig::default(),
            longtail: LongtailConfig::default(),
            vocabulary: VocabularyConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowshoeConfig {
    /// A source counts as "low volume" at or below this many sessions.
    pub low_volume_max_sessions: usize,
    /// Source-count scale for the volume indicator (log1p normalized).
    pub volume_source_scale: usize,
    pub temporal_epsilon_secs: f64,
    pub temporal_min_points: usize,
    pub geographic_epsilon_km: f64,
    pub geographic_min_points: usize,
    pub behavioral_epsilon: f64,
    pub behavioral_min_points: usize,
    /// Geographic diversity needs at least this many distinct IPs.
    pub min_geographic_ips: usize,
    /// Behavioral similarity needs at least this many distinct IPs.
    pub min_behavioral_ips: usize,
    /// Password intelligence needs at least this many auth attempts.
    pub min_auth_attempts: usize,
    /// Emit a snowshoe detection at or above this confidence.
    pub detection_threshold: f64,
}

impl Default for SnowshoeConfig {
    fn default() -> Self {
        Self {
            low_volume_max_sessions: 3,
            volume_source_scale: 500,
            temporal_epsilon_secs: 600.0,
            temporal_min_points: 2,
            geographic_epsilon_km: 500.0,
            geographic_min_points: 2,
            behavioral_epsilon: 0.25,
            behavioral_min_points: 2,
            min_geographic_ips: 5,
            min_behavioral_ips: 5,
            min_auth_attempts: 1,
            detection_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LongtailConfig {
    /// Bottom percentile of the command frequency distribution treated
    /// as rare.
    pub rarity_percentile: f64,
    /// Rare-command analysis needs at least this many command events.
    pub min_command_corpus: usize,
    /// Sliding window length (commands) for sequence analysis.
    pub sequence_length: usize,
    /// Nearest-neighbor cosine distance above which a sequence is
    /// anomalous.
    pub sequence_distance_threshold: f64,
    /// Sequence analysis needs at least this many windows overall.
    pub min_sequence_windows: usize,
    pub behavioral_epsilon: f64,
    pub behavioral_min_points: usize,
    /// Outlier analysis needs at least this many sessions.
    pub min_outlier_sessions: usize,
    /// Events older than `window_end - baseline_days` form the
    /// historical baseline for emerging-pattern analysis.
    pub baseline_days: u32,
    /// A pattern must appear at least this often in the recent period
    /// to be reported as emerging.
    pub min_pattern_recent_count: u64,
    /// Normalized character entropy at or above this flags a payload.
    pub entropy_threshold: f64,
    /// Payload fields shorter than this are skipped by the entropy
    /// detector.
    pub min_entropy_len: usize,
}

impl Default for LongtailConfig {
    fn default() -> Self {
        Self {
            rarity_percentile: 5.0,
            min_command_corpus: 20,
            sequence_length: 5,
            sequence_distance_threshold: 0.7,
            min_sequence_windows: 10,
            behavioral_epsilon: 0.3,
            behavioral_min_points: 5,
            min_outlier_sessions: 10,
            baseline_days: 7,
            min_pattern_recent_count: 3,
            entropy_threshold: 0.8,
            min_entropy_len: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Growth stops at this many tokens; out-of-vocabulary tokens are
    /// dropped, never an error.
    pub max_size: usize,
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub use_idf: bool,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ngram_min: 1,
            ngram_max: 3,
            use_idf: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Snowshoe indicator weights; must cover `SNOWSHOE_INDICATORS`
    /// and sum to 1.0 +/- 0.01.
    pub snowshoe_weights: BTreeMap<String, f64>,
    /// Longtail category weights; must cover `LONGTAIL_INDICATORS`
    /// and sum to 1.0 +/- 0.01.
    pub longtail_weights: BTreeMap<String, f64>,
    pub credential_stuffing_threshold: f64,
    pub targeted_attack_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let snowshoe_weights = BTreeMap::from([
            ("volume".to_string(), 0.20),
            ("temporal".to_string(), 0.25),
            ("geographic".to_string(), 0.20),
            ("behavioral".to_string(), 0.20),
            ("password_intel".to_string(), 0.15),
        ]);
        let longtail_weights = BTreeMap::from([
            ("rare_command".to_string(), 0.20),
            ("anomalous_sequence".to_string(), 0.20),
            ("behavioral_outlier".to_string(), 0.20),
            ("emerging_pattern".to_string(), 0.20),
            ("high_entropy_payload".to_string(), 0.20),
        ]);
        Self {
            snowshoe_weights,
            longtail_weights,
            credential_stuffing_threshold: 0.7,
            targeted_attack_threshold: 0.3,
        }
    }
}

impl AnalysisConfig {
    /// Fail-fast validation, run before any session is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_budget_bytes == 0 {
            return Err(ConfigError::NonPositive {
                field: "memory_budget_bytes",
                value: 0.0,
            });
        }

        validate_weights("snowshoe", &self.scoring.snowshoe_weights, &SNOWSHOE_INDICATORS)?;
        validate_weights("longtail", &self.scoring.longtail_weights, &LONGTAIL_INDICATORS)?;

        for (field, value) in [
            ("credential_stuffing_threshold", self.scoring.credential_stuffing_threshold),
            ("targeted_attack_threshold", self.scoring.targeted_attack_threshold),
            ("snowshoe.detection_threshold", self.snowshoe.detection_threshold),
            ("longtail.entropy_threshold", self.longtail.entropy_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        if self.scoring.targeted_attack_threshold >= self.scoring.credential_stuffing_threshold {
            return Err(ConfigError::ThresholdOrder {
                targeted: self.scoring.targeted_attack_threshold,
                credential_stuffing: self.scoring.credential_stuffing_threshold,
            });
        }

        for (field, value) in [
            ("snowshoe.temporal_epsilon_secs", self.snowshoe.temporal_epsilon_secs),
            ("snowshoe.geographic_epsilon_km", self.snowshoe.geographic_epsilon_km),
            ("snowshoe.behavioral_epsilon", self.snowshoe.behavioral_epsilon),
            ("longtail.behavioral_epsilon", self.longtail.behavioral_epsilon),
            (
                "longtail.sequence_distance_threshold",
                self.longtail.sequence_distance_threshold,
            ),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        // Structural guarantee: a single distinct source can never seed
        // a snowshoe cluster.
        for (field, value) in [
            ("snowshoe.temporal_min_points", self.snowshoe.temporal_min_points),
            ("snowshoe.geographic_min_points", self.snowshoe.geographic_min_points),
            ("snowshoe.behavioral_min_points", self.snowshoe.behavioral_min_points),
            ("longtail.behavioral_min_points", self.longtail.behavioral_min_points),
            ("longtail.sequence_length", self.longtail.sequence_length),
        ] {
            if value < 2 {
                return Err(ConfigError::MinPointsTooSmall { field, value });
            }
        }

        if !(0.0..=50.0).contains(&self.longtail.rarity_percentile)
            || self.longtail.rarity_percentile <= 0.0
        {
            return Err(ConfigError::OutOfRange {
                field: "longtail.rarity_percentile",
                value: self.longtail.rarity_percentile,
            });
        }

        if self.vocabulary.max_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "vocabulary.max_size",
                value: 0.0,
            });
        }
        let (nmin, nmax) = (self.vocabulary.ngram_min, self.vocabulary.ngram_max);
        if nmin < 1 || nmin > nmax || nmax > 5 {
            return Err(ConfigError::BadNgramRange { min: nmin, max: nmax });
        }

        Ok(())
    }
}

fn validate_weights(
    which: &'static str,
    weights: &BTreeMap<String, f64>,
    known: &[&'static str],
) -> Result<(), ConfigError> {
    for name in weights.keys() {
        if !known.contains(&name.as_str()) {
            return Err(ConfigError::UnknownIndicator {
                which,
                name: name.clone(),
            });
        }
    }
    for name in known {
        if !weights.contains_key(*name) {
            return Err(ConfigError::MissingIndicator { which, name });
        }
    }
    let sum: f64 = weights.values().sum();
    if !sum.is_finite() || (sum - 1.0).abs() > 0.01 {
        return Err(ConfigError::WeightSum { which, sum });
    }
    Ok(())
}
