use std::fmt;

use store::StoreError;

/// Configuration rejected at load time, before any session is touched.
#[derive(Debug)]
pub enum ConfigError {
    WeightSum { which: &'static str, sum: f64 },
    UnknownIndicator { which: &'static str, name: String },
    MissingIndicator { which: &'static str, name: &'static str },
    NonPositive { field: &'static str, value: f64 },
    OutOfRange { field: &'static str, value: f64 },
    MinPointsTooSmall { field: &'static str, value: usize },
    BadNgramRange { min: usize, max: usize },
    ThresholdOrder { targeted: f64, credential_stuffing: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeightSum { which, sum } => {
                write!(f, "{} weights must sum to 1.0 +/- 0.01, got {}", which, sum)
            }
            Self::UnknownIndicator { which, name } => {
                write!(f, "{} weights name unknown indicator {:?}", which, name)
            }
            Self::MissingIndicator { which, name } => {
                write!(f, "{} weights missing indicator {:?}", which, name)
            }
            Self::NonPositive { field, value } => {
                write!(f, "{} must be positive, got {}", field, value)
            }
            Self::OutOfRange { field, value } => {
                write!(f, "{} must be within [0,1], got {}", field, value)
            }
            Self::MinPointsTooSmall { field, value } => {
                write!(f, "{} must be at least 2, got {}", field, value)
            }
            Self::BadNgramRange { min, max } => {
                write!(f, "n-gram range must satisfy 1 <= min <= max <= 5, got {}..={}", min, max)
            }
            Self::ThresholdOrder {
                targeted,
                credential_stuffing,
            } => write!(
                f,
                "targeted_attack_threshold ({}) must be below credential_stuffing_threshold ({})",
                targeted, credential_stuffing
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced to the host by a run. Insufficient data, malformed
/// features, and capability probe failures are recovered locally and
/// never appear here.
#[derive(Debug)]
pub enum AnalysisError {
    Config(ConfigError),
    /// Persistence failure for the vocabulary, checkpoint, or result.
    /// Fatal for the current run; committed state is untouched.
    Store(StoreError),
    Serialize(serde_json::Error),
    Cancelled,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {}", err),
            Self::Store(err) => write!(f, "persistence failure: {}", err),
            Self::Serialize(err) => write!(f, "serialization failure: {}", err),
            Self::Cancelled => write!(f, "analysis cancelled"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}

impl From<ConfigError> for AnalysisError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for AnalysisError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

pub type RunResult<T> = std::result::Result<T, AnalysisError>;
