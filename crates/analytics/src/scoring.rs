//! Multi-indicator confidence scoring.
//!
//! Indicators that could not be computed (insufficient samples) arrive
//! as `None`; their weight is excluded and the remaining weights are
//! renormalized to sum to 1.0 before the weighted sum. A structurally
//! absent signal therefore never deflates confidence the way a
//! genuinely low score does.

use std::collections::BTreeMap;

use crate::information::clamp01;
use crate::types::Verdict;

#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub confidence: f64,
    pub verdict: Verdict,
    /// Present indicators and their raw scores, sorted by name.
    pub contributions: Vec<(String, f64)>,
    /// Indicators skipped for lack of data, sorted by name.
    pub skipped: Vec<String>,
}

pub struct ScoringEngine<'c> {
    weights: &'c BTreeMap<String, f64>,
    credential_stuffing_threshold: f64,
    targeted_attack_threshold: f64,
}

impl<'c> ScoringEngine<'c> {
    /// `weights` must have been validated at configuration load
    /// (coverage of the indicator set, sum 1.0 +/- 0.01).
    pub fn new(
        weights: &'c BTreeMap<String, f64>,
        credential_stuffing_threshold: f64,
        targeted_attack_threshold: f64,
    ) -> Self {
        Self {
            weights,
            credential_stuffing_threshold,
            targeted_attack_threshold,
        }
    }

    pub fn score(&self, indicators: &BTreeMap<String, Option<f64>>) -> ScoreOutcome {
        let mut contributions = Vec::new();
        let mut skipped = Vec::new();
        let mut present_weight = 0.0;

        for (name, weight) in self.weights {
            match indicators.get(name).copied().flatten() {
                Some(value) => {
                    contributions.push((name.clone(), clamp01(value)));
                    present_weight += weight;
                }
                None => skipped.push(name.clone()),
            }
        }

        if contributions.is_empty() || present_weight <= 0.0 {
            return ScoreOutcome {
                confidence: 0.0,
                verdict: Verdict::Benign,
                contributions,
                skipped,
            };
        }

        // Renormalize the surviving weights to sum to 1.0.
        let confidence: f64 = contributions
            .iter()
            .map(|(name, value)| value * self.weights[name] / present_weight)
            .sum();
        let confidence = clamp01(confidence);

        let verdict = if confidence >= self.credential_stuffing_threshold {
            Verdict::CredentialStuffing
        } else if confidence <= self.targeted_attack_threshold {
            Verdict::TargetedAttack
        } else {
            // Strictly between the two thresholds.
            Verdict::Hybrid
        };

        ScoreOutcome {
            confidence,
            verdict,
            contributions,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests;
