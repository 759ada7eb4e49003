//! Entropy and normalization helpers shared by the extractors and
//! sub-detectors. Everything here returns finite values; callers rely
//! on that to uphold the [0,1] feature invariant.

use std::collections::HashMap;

/// Shannon entropy (bits) of the byte distribution of `s`.
pub(crate) fn shannon_entropy_bits(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<u8, usize> = HashMap::new();
    for b in s.as_bytes() {
        *freq.entry(*b).or_insert(0) += 1;
    }

    let n = s.len() as f64;
    freq.values()
        .map(|c| {
            let p = *c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Character-level entropy of `s`, normalized to [0,1] by the maximum
/// entropy for the observed character set (log2 of distinct bytes).
/// Zero when fewer than two distinct characters are present.
pub(crate) fn normalized_char_entropy(s: &str) -> f64 {
    let mut seen = [false; 256];
    let mut distinct = 0usize;
    for b in s.as_bytes() {
        if !seen[*b as usize] {
            seen[*b as usize] = true;
            distinct += 1;
        }
    }
    if distinct <= 1 {
        return 0.0;
    }
    let max_bits = (distinct as f64).log2();
    clamp01(shannon_entropy_bits(s) / max_bits)
}

/// Shannon entropy of an arbitrary count distribution, normalized to
/// [0,1] by log2(distinct). Zero when `distinct <= 1`.
pub(crate) fn normalized_count_entropy<I>(counts: I) -> f64
where
    I: IntoIterator<Item = u64>,
{
    let counts: Vec<u64> = counts.into_iter().filter(|&c| c > 0).collect();
    if counts.len() <= 1 {
        return 0.0;
    }
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    let h: f64 = counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum();
    clamp01(h / (counts.len() as f64).log2())
}

/// `log1p(x) / log1p(max)` scaling for unbounded counts and durations.
/// Values at or above `max` clamp to 1.0.
pub(crate) fn log1p_norm(x: f64, max: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 || max <= 0.0 {
        return 0.0;
    }
    clamp01(x.ln_1p() / max.ln_1p())
}

/// Safe ratio: 0.0 on a zero or non-finite denominator, clamped to [0,1].
pub(crate) fn ratio(num: f64, den: f64) -> f64 {
    if !den.is_finite() || den <= 0.0 || !num.is_finite() {
        return 0.0;
    }
    clamp01(num / den)
}

pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(0.0, 1.0)
}

/// Percentile over a pre-sorted slice (nearest-rank).
pub(crate) fn percentile_sorted(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * (values.len() - 1) as f64).round() as usize;
    values[rank.min(values.len() - 1)]
}

/// Cosine distance (1 - cosine similarity) between two dense vectors.
/// Zero-norm inputs are maximally distant from everything non-zero and
/// at distance zero from each other.
pub(crate) fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= 0.0 && nb <= 0.0 {
        return 0.0;
    }
    if na <= 0.0 || nb <= 0.0 {
        return 1.0;
    }
    (1.0 - dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 2.0)
}

/// Great-circle distance in kilometers between two WGS84 coordinates.
pub(crate) fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
