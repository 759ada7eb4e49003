use super::*;
use crate::config::ScoringConfig;

fn indicators(pairs: &[(&str, Option<f64>)]) -> BTreeMap<String, Option<f64>> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

fn snowshoe_engine(scoring: &ScoringConfig) -> ScoringEngine<'_> {
    ScoringEngine::new(
        &scoring.snowshoe_weights,
        scoring.credential_stuffing_threshold,
        scoring.targeted_attack_threshold,
    )
}

#[test]
fn full_indicator_set_is_a_plain_weighted_sum() {
    let scoring = ScoringConfig::default();
    let outcome = snowshoe_engine(&scoring).score(&indicators(&[
        ("volume", Some(1.0)),
        ("temporal", Some(1.0)),
        ("geographic", Some(1.0)),
        ("behavioral", Some(1.0)),
        ("password_intel", Some(1.0)),
    ]));
    assert!((outcome.confidence - 1.0).abs() < 1e-12);
    assert_eq!(outcome.verdict, Verdict::CredentialStuffing);
    assert!(outcome.skipped.is_empty());
}

#[test]
fn absent_indicators_renormalize_instead_of_deflating() {
    let scoring = ScoringConfig::default();
    // Only temporal observed, at 0.8. Without renormalization the
    // confidence would be 0.25 * 0.8 = 0.2.
    let outcome = snowshoe_engine(&scoring).score(&indicators(&[
        ("volume", None),
        ("temporal", Some(0.8)),
        ("geographic", None),
        ("behavioral", None),
        ("password_intel", None),
    ]));
    assert!((outcome.confidence - 0.8).abs() < 1e-12);
    let expected: Vec<String> = ["behavioral", "geographic", "password_intel", "volume"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(outcome.skipped, expected);
}

#[test]
fn partial_set_uses_relative_weights() {
    let scoring = ScoringConfig::default();
    // temporal 0.25 and volume 0.20 survive; renormalized to 5/9, 4/9.
    let outcome = snowshoe_engine(&scoring).score(&indicators(&[
        ("volume", Some(0.0)),
        ("temporal", Some(0.9)),
        ("geographic", None),
        ("behavioral", None),
        ("password_intel", None),
    ]));
    let expected = 0.9 * (0.25 / 0.45);
    assert!((outcome.confidence - expected).abs() < 1e-12);
}

#[test]
fn no_indicators_means_benign_zero() {
    let scoring = ScoringConfig::default();
    let outcome = snowshoe_engine(&scoring).score(&indicators(&[
        ("volume", None),
        ("temporal", None),
        ("geographic", None),
        ("behavioral", None),
        ("password_intel", None),
    ]));
    assert_eq!(outcome.confidence, 0.0);
    assert_eq!(outcome.verdict, Verdict::Benign);
    assert_eq!(outcome.skipped.len(), 5);
}

#[test]
fn verdict_bands_include_their_thresholds() {
    let scoring = ScoringConfig::default();
    let engine = snowshoe_engine(&scoring);
    let at = |v: f64| {
        engine
            .score(&indicators(&[
                ("volume", Some(v)),
                ("temporal", Some(v)),
                ("geographic", Some(v)),
                ("behavioral", Some(v)),
                ("password_intel", Some(v)),
            ]))
            .verdict
    };
    assert_eq!(at(0.7), Verdict::CredentialStuffing);
    assert_eq!(at(0.5), Verdict::Hybrid);
    assert_eq!(at(0.3), Verdict::TargetedAttack);
    assert_eq!(at(0.0), Verdict::TargetedAttack);
}

#[test]
fn out_of_range_scores_are_clamped() {
    let scoring = ScoringConfig::default();
    let outcome = snowshoe_engine(&scoring).score(&indicators(&[
        ("volume", Some(7.5)),
        ("temporal", Some(-2.0)),
        ("geographic", None),
        ("behavioral", None),
        ("password_intel", None),
    ]));
    let contributions: BTreeMap<String, f64> = outcome.contributions.into_iter().collect();
    assert_eq!(contributions["volume"], 1.0);
    assert_eq!(contributions["temporal"], 0.0);
}
