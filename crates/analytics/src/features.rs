//! 64-dimension behavioral feature vectors.
//!
//! Segment layout: temporal 0-7, command 8-23, authentication 24-31,
//! network 32-39, file 40-47, geographic 48-55, password intelligence
//! 56-63. Every value is finite and in [0,1]; out-of-range intermediate
//! values are clamped and counted, never propagated.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::information::{
    clamp01, haversine_km, log1p_norm, normalized_char_entropy, normalized_count_entropy, ratio,
};
use crate::types::{QualityCounters, SessionRecord, TransferDirection};

pub const FEATURE_COUNT: usize = 64;

pub(crate) const SEG_TEMPORAL: usize = 0;
pub(crate) const SEG_COMMAND: usize = 8;
pub(crate) const SEG_AUTH: usize = 24;
pub(crate) const SEG_NETWORK: usize = 32;
pub(crate) const SEG_FILE: usize = 40;
pub(crate) const SEG_GEO: usize = 48;
pub(crate) const SEG_PASSWORD: usize = 56;

/// Fixed normalization maxima. Counts above these clamp to 1.0.
const SESSION_DURATION_MAX_SECS: f64 = 86_400.0;
const COMMAND_COUNT_MAX: f64 = 10_000.0;
const COMMAND_LEN_AVG_MAX: f64 = 1_024.0;
const COMMAND_LEN_MAX: f64 = 8_192.0;
const COMMAND_RATE_MAX_PER_MIN: f64 = 600.0;
const AUTH_ATTEMPTS_MAX: f64 = 1_000.0;
const PASSWORD_LEN_MAX: f64 = 64.0;
const DISTINCT_PORTS_MAX: f64 = 100.0;
const BYTES_MAX: f64 = 1e9;
const FILE_TRANSFERS_MAX: f64 = 100.0;
const GEO_SPREAD_MAX_KM: f64 = 20_000.0;
const BREACHED_PASSWORDS_MAX: f64 = 1_000.0;

/// Feature names, index-aligned with the vector.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    // temporal
    "session_duration",
    "start_hour_of_day",
    "start_day_of_week",
    "commands_per_minute",
    "auth_attempts_per_minute",
    "night_activity",
    "weekend_activity",
    "hit_and_run",
    // command
    "command_count",
    "distinct_command_ratio",
    "avg_command_length",
    "max_command_length",
    "command_diversity",
    "dangerous_command_ratio",
    "download_command_ratio",
    "recon_command_ratio",
    "persistence_command_ratio",
    "privilege_command_ratio",
    "mean_command_entropy",
    "max_command_entropy",
    "command_chaining_ratio",
    "redirection_ratio",
    "encoded_blob_ratio",
    "first_token_diversity",
    // authentication
    "auth_attempt_count",
    "auth_success_ratio",
    "username_diversity",
    "password_diversity",
    "identical_credential_ratio",
    "privileged_account_ratio",
    "mean_password_length",
    "failed_then_success",
    // network
    "distinct_port_count",
    "well_known_port_ratio",
    "bytes_in",
    "bytes_out",
    "upload_imbalance",
    "remote_shell_port",
    "high_port_activity",
    "port_diversity",
    // file
    "file_transfer_count",
    "download_count",
    "upload_count",
    "transfer_bytes",
    "malware_detection_ratio",
    "executable_file_ratio",
    "archive_file_ratio",
    "filename_entropy",
    // geographic
    "country_known",
    "cloud_provider",
    "vpn_exit",
    "tor_exit",
    "coordinates_known",
    "geographic_spread",
    "country_diversity",
    "asn_diversity",
    // password intelligence
    "breach_ratio",
    "breached_password_count",
    "distinct_password_ratio",
    "weak_password_ratio",
    "cross_source_password_reuse",
    "numeric_password_ratio",
    "dictionary_password_ratio",
    "mean_password_entropy",
];

/// Indices holding binary "any" flags; aggregation OR-reduces these.
const FLAG_INDICES: [usize; 11] = [5, 6, 7, 31, 37, 38, 48, 49, 50, 51, 52];

const DANGEROUS_KEYWORDS: [&str; 10] = [
    "rm -rf", "chmod", "dd if", "mkfs", "base64 -d", "nohup", "pkill", "iptables", "insmod",
    "history -c",
];
const DOWNLOAD_KEYWORDS: [&str; 5] = ["wget", "curl", "tftp", "ftpget", "scp"];
const RECON_KEYWORDS: [&str; 8] = [
    "uname", "whoami", "id", "ps ", "netstat", "ifconfig", "cat /proc", "lscpu",
];
const PERSISTENCE_KEYWORDS: [&str; 6] = [
    "crontab", "systemctl", "rc.local", "authorized_keys", "init.d", ".bashrc",
];
const PRIVILEGE_KEYWORDS: [&str; 4] = ["sudo", "su ", "passwd", "usermod"];
const PRIVILEGED_ACCOUNTS: [&str; 5] = ["root", "admin", "administrator", "oracle", "postgres"];

/// In-memory only: vectors never outlive a run, and evidence payloads
/// carry derived scores rather than raw features.
#[derive(Debug, Clone)]
pub struct BehavioralFeatureVector {
    pub values: [f64; FEATURE_COUNT],
    /// Extraction quality: clamped malformed values and structurally
    /// unavailable enrichment signals. A 0.0 backed by an unavailable
    /// signal means "unknown", not "benign".
    pub quality: QualityCounters,
}

impl BehavioralFeatureVector {
    pub fn zeroed() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
            quality: QualityCounters::default(),
        }
    }
}

/// Extract the behavioral vector for one session. Never fails: missing
/// signals become documented neutral values plus a quality flag.
pub fn extract(session: &SessionRecord) -> BehavioralFeatureVector {
    let mut out = BehavioralFeatureVector::zeroed();

    temporal_features(session, &mut out.values[SEG_TEMPORAL..SEG_COMMAND]);
    command_features(session, &mut out.values[SEG_COMMAND..SEG_AUTH]);
    auth_features(session, &mut out.values[SEG_AUTH..SEG_NETWORK]);
    network_features(session, &mut out.values[SEG_NETWORK..SEG_FILE]);
    file_features(session, &mut out.values[SEG_FILE..SEG_GEO], &mut out.quality);
    geographic_features(session, &mut out.values[SEG_GEO..SEG_PASSWORD], &mut out.quality);
    password_features(session, &mut out.values[SEG_PASSWORD..], &mut out.quality);

    sanitize(&mut out);
    out
}

/// One entity (typically a source IP) entering cluster-level
/// aggregation: its per-entity vector plus the raw sessions behind it.
#[derive(Debug, Clone)]
pub struct EntityFeatures<'a> {
    pub entity_id: String,
    pub vector: BehavioralFeatureVector,
    pub sessions: Vec<&'a SessionRecord>,
}

/// Aggregate per-entity vectors into one cluster-level vector.
///
/// Cluster-scope features (total volumes, time span, pooled diversity
/// entropies, geographic spread) are recomputed over the raw inputs of
/// all entities; averaging the per-entity normalized values would
/// systematically understate them. Per-entity-scope features use a
/// session-count-weighted mean, and "any" flags OR-reduce.
pub fn aggregate(entities: &[EntityFeatures<'_>]) -> BehavioralFeatureVector {
    let mut out = BehavioralFeatureVector::zeroed();
    if entities.is_empty() {
        return out;
    }

    let total_sessions: usize = entities.iter().map(|e| e.sessions.len()).sum();
    let total_sessions = total_sessions.max(1) as f64;

    // Weighted-mean baseline.
    for entity in entities {
        let weight = entity.sessions.len() as f64 / total_sessions;
        for (i, v) in entity.vector.values.iter().enumerate() {
            out.values[i] += weight * v;
        }
        out.quality.merge(entity.vector.quality);
    }

    // Binary flags: set if any entity set them.
    for idx in FLAG_INDICES {
        let any = entities.iter().any(|e| e.vector.values[idx] >= 0.5);
        out.values[idx] = if any { 1.0 } else { 0.0 };
    }

    let all_sessions: Vec<&SessionRecord> =
        entities.iter().flat_map(|e| e.sessions.iter().copied()).collect();

    // Cluster time span, not mean session duration.
    let span = match (
        all_sessions.iter().map(|s| s.start_ts_unix).min(),
        all_sessions.iter().map(|s| s.end_ts_unix).max(),
    ) {
        (Some(start), Some(end)) => end.saturating_sub(start).max(0) as f64,
        _ => 0.0,
    };
    out.values[0] = log1p_norm(span, SESSION_DURATION_MAX_SECS);

    // Pooled command volume and diversity.
    let total_commands: usize = all_sessions.iter().map(|s| s.commands.len()).sum();
    out.values[8] = log1p_norm(total_commands as f64, COMMAND_COUNT_MAX);
    let mut command_counts: HashMap<&str, u64> = HashMap::new();
    let mut first_tokens: HashMap<&str, u64> = HashMap::new();
    for session in &all_sessions {
        for cmd in &session.commands {
            *command_counts.entry(cmd.as_str()).or_insert(0) += 1;
            if let Some(tok) = cmd.split_whitespace().next() {
                *first_tokens.entry(tok).or_insert(0) += 1;
            }
        }
    }
    out.values[12] = normalized_count_entropy(command_counts.values().copied());
    out.values[23] = normalized_count_entropy(first_tokens.values().copied());

    // Pooled authentication volume and credential diversity.
    let total_auth: usize = all_sessions.iter().map(|s| s.auth_attempts.len()).sum();
    out.values[24] = log1p_norm(total_auth as f64, AUTH_ATTEMPTS_MAX);
    let mut usernames: HashMap<&str, u64> = HashMap::new();
    let mut passwords: HashMap<&str, u64> = HashMap::new();
    for session in &all_sessions {
        for attempt in &session.auth_attempts {
            *usernames.entry(attempt.username.as_str()).or_insert(0) += 1;
            *passwords.entry(attempt.password.as_str()).or_insert(0) += 1;
        }
    }
    out.values[26] = normalized_count_entropy(usernames.values().copied());
    out.values[27] = normalized_count_entropy(passwords.values().copied());

    // Pooled network volume.
    let mut port_counts: HashMap<u16, u64> = HashMap::new();
    for session in &all_sessions {
        for port in &session.dst_ports {
            *port_counts.entry(*port).or_insert(0) += 1;
        }
    }
    out.values[32] = log1p_norm(port_counts.len() as f64, DISTINCT_PORTS_MAX);
    out.values[39] = normalized_count_entropy(port_counts.values().copied());
    let bytes_in: u64 = all_sessions.iter().map(|s| s.bytes_in).sum();
    let bytes_out: u64 = all_sessions.iter().map(|s| s.bytes_out).sum();
    out.values[34] = log1p_norm(bytes_in as f64, BYTES_MAX);
    out.values[35] = log1p_norm(bytes_out as f64, BYTES_MAX);

    // File transfer volumes are summed: cluster-level download volume
    // is the signal, not the per-source average.
    let transfers: usize = all_sessions.iter().map(|s| s.file_transfers.len()).sum();
    let downloads: usize = all_sessions
        .iter()
        .flat_map(|s| &s.file_transfers)
        .filter(|t| t.direction == TransferDirection::Download)
        .count();
    let uploads = transfers - downloads;
    let transfer_bytes: u64 = all_sessions
        .iter()
        .flat_map(|s| &s.file_transfers)
        .map(|t| t.size_bytes)
        .sum();
    out.values[40] = log1p_norm(transfers as f64, FILE_TRANSFERS_MAX);
    out.values[41] = log1p_norm(downloads as f64, FILE_TRANSFERS_MAX);
    out.values[42] = log1p_norm(uploads as f64, FILE_TRANSFERS_MAX);
    out.values[43] = log1p_norm(transfer_bytes as f64, BYTES_MAX);

    // Geographic spread and diversity over the pooled entities.
    let coords: Vec<(f64, f64)> = all_sessions
        .iter()
        .filter_map(|s| match (s.enrichment.latitude, s.enrichment.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        })
        .collect();
    out.values[53] = log1p_norm(max_pairwise_km(&coords), GEO_SPREAD_MAX_KM);
    let mut countries: HashMap<&str, u64> = HashMap::new();
    let mut asns: HashMap<u32, u64> = HashMap::new();
    for session in &all_sessions {
        if let Some(country) = session.enrichment.country.as_deref() {
            *countries.entry(country).or_insert(0) += 1;
        }
        if let Some(asn) = session.enrichment.asn {
            *asns.entry(asn).or_insert(0) += 1;
        }
    }
    out.values[54] = normalized_count_entropy(countries.values().copied());
    out.values[55] = normalized_count_entropy(asns.values().copied());

    // Pooled breach statistics.
    let mut breached: u64 = 0;
    let mut attempts_with_data: u64 = 0;
    let mut any_breach_data = false;
    for session in &all_sessions {
        if let Some(count) = session.enrichment.breached_passwords {
            any_breach_data = true;
            breached += count;
            attempts_with_data += session.auth_attempts.len() as u64;
        }
    }
    if any_breach_data {
        out.values[56] = ratio(breached as f64, attempts_with_data as f64);
        out.values[57] = log1p_norm(breached as f64, BREACHED_PASSWORDS_MAX);
    }

    // Password reuse across entities: distinct passwords seen from two
    // or more sources, over all distinct passwords.
    if entities.len() >= 2 {
        let mut seen_by: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
        for (idx, entity) in entities.iter().enumerate() {
            for session in &entity.sessions {
                for attempt in &session.auth_attempts {
                    seen_by.entry(attempt.password.as_str()).or_default().insert(idx);
                }
            }
        }
        if !seen_by.is_empty() {
            let reused = seen_by.values().filter(|s| s.len() >= 2).count();
            out.values[60] = ratio(reused as f64, seen_by.len() as f64);
        }
    }

    sanitize(&mut out);
    out
}

fn temporal_features(session: &SessionRecord, out: &mut [f64]) {
    let duration = session.duration_secs();
    out[0] = log1p_norm(duration, SESSION_DURATION_MAX_SECS);

    let secs_of_day = session.start_ts_unix.rem_euclid(86_400);
    let hour = (secs_of_day / 3_600) as f64;
    out[1] = hour / 23.0;

    // Days since epoch, offset so 0 = Sunday (1970-01-01 was a Thursday).
    let dow = (session.start_ts_unix.div_euclid(86_400) + 4).rem_euclid(7);
    out[2] = dow as f64 / 6.0;

    let minutes = (duration / 60.0).max(1.0 / 60.0);
    out[3] = log1p_norm(session.commands.len() as f64 / minutes, COMMAND_RATE_MAX_PER_MIN);
    out[4] = log1p_norm(
        session.auth_attempts.len() as f64 / minutes,
        COMMAND_RATE_MAX_PER_MIN,
    );

    out[5] = if hour < 6.0 { 1.0 } else { 0.0 };
    out[6] = if dow == 0 || dow == 6 { 1.0 } else { 0.0 };
    out[7] = if duration <= 10.0 && !session.auth_attempts.is_empty() {
        1.0
    } else {
        0.0
    };
}

fn command_features(session: &SessionRecord, out: &mut [f64]) {
    let commands = &session.commands;
    let n = commands.len();
    out[0] = log1p_norm(n as f64, COMMAND_COUNT_MAX);
    if n == 0 {
        return;
    }

    let distinct: HashSet<&str> = commands.iter().map(|c| c.as_str()).collect();
    out[1] = ratio(distinct.len() as f64, n as f64);

    let total_len: usize = commands.iter().map(|c| c.len()).sum();
    out[2] = log1p_norm(total_len as f64 / n as f64, COMMAND_LEN_AVG_MAX);
    let max_len = commands.iter().map(|c| c.len()).max().unwrap_or(0);
    out[3] = log1p_norm(max_len as f64, COMMAND_LEN_MAX);

    let mut counts: HashMap<&str, u64> = HashMap::new();
    for cmd in commands {
        *counts.entry(cmd.as_str()).or_insert(0) += 1;
    }
    out[4] = normalized_count_entropy(counts.values().copied());

    out[5] = keyword_ratio(commands, &DANGEROUS_KEYWORDS);
    out[6] = keyword_ratio(commands, &DOWNLOAD_KEYWORDS);
    out[7] = keyword_ratio(commands, &RECON_KEYWORDS);
    out[8] = keyword_ratio(commands, &PERSISTENCE_KEYWORDS);
    out[9] = keyword_ratio(commands, &PRIVILEGE_KEYWORDS);

    let entropies: Vec<f64> = commands.iter().map(|c| normalized_char_entropy(c)).collect();
    out[10] = entropies.iter().sum::<f64>() / entropies.len() as f64;
    out[11] = entropies.iter().copied().fold(0.0, f64::max);

    let chained = commands
        .iter()
        .filter(|c| c.contains('|') || c.contains("&&") || c.contains(';'))
        .count();
    out[12] = ratio(chained as f64, n as f64);
    let redirected = commands.iter().filter(|c| c.contains('>')).count();
    out[13] = ratio(redirected as f64, n as f64);

    let encoded = commands.iter().filter(|c| has_encoded_blob(c)).count();
    out[14] = ratio(encoded as f64, n as f64);

    let mut first_tokens: HashMap<&str, u64> = HashMap::new();
    for cmd in commands {
        if let Some(tok) = cmd.split_whitespace().next() {
            *first_tokens.entry(tok).or_insert(0) += 1;
        }
    }
    out[15] = normalized_count_entropy(first_tokens.values().copied());
}

fn auth_features(session: &SessionRecord, out: &mut [f64]) {
    let attempts = &session.auth_attempts;
    let n = attempts.len();
    out[0] = log1p_norm(n as f64, AUTH_ATTEMPTS_MAX);
    if n == 0 {
        return;
    }

    let successes = attempts.iter().filter(|a| a.success).count();
    out[1] = ratio(successes as f64, n as f64);

    let mut usernames: HashMap<&str, u64> = HashMap::new();
    let mut passwords: HashMap<&str, u64> = HashMap::new();
    for attempt in attempts {
        *usernames.entry(attempt.username.as_str()).or_insert(0) += 1;
        *passwords.entry(attempt.password.as_str()).or_insert(0) += 1;
    }
    out[2] = normalized_count_entropy(usernames.values().copied());
    out[3] = normalized_count_entropy(passwords.values().copied());

    let identical = attempts.iter().filter(|a| a.username == a.password).count();
    out[4] = ratio(identical as f64, n as f64);

    let privileged = attempts
        .iter()
        .filter(|a| PRIVILEGED_ACCOUNTS.contains(&a.username.to_ascii_lowercase().as_str()))
        .count();
    out[5] = ratio(privileged as f64, n as f64);

    let total_pw_len: usize = attempts.iter().map(|a| a.password.len()).sum();
    out[6] = log1p_norm(total_pw_len as f64 / n as f64, PASSWORD_LEN_MAX);

    let failed_then_success = attempts
        .iter()
        .position(|a| a.success)
        .map(|i| i > 0)
        .unwrap_or(false);
    out[7] = if failed_then_success { 1.0 } else { 0.0 };
}

fn network_features(session: &SessionRecord, out: &mut [f64]) {
    let mut port_counts: HashMap<u16, u64> = HashMap::new();
    for port in &session.dst_ports {
        *port_counts.entry(*port).or_insert(0) += 1;
    }
    out[0] = log1p_norm(port_counts.len() as f64, DISTINCT_PORTS_MAX);

    let n = session.dst_ports.len();
    if n > 0 {
        let well_known = session.dst_ports.iter().filter(|&&p| p < 1024).count();
        out[1] = ratio(well_known as f64, n as f64);
    }

    out[2] = log1p_norm(session.bytes_in as f64, BYTES_MAX);
    out[3] = log1p_norm(session.bytes_out as f64, BYTES_MAX);
    let total = session.bytes_in.saturating_add(session.bytes_out);
    out[4] = ratio(session.bytes_out as f64, total as f64);

    out[5] = if session.dst_ports.iter().any(|&p| p == 22 || p == 23) {
        1.0
    } else {
        0.0
    };
    out[6] = if session.dst_ports.iter().any(|&p| p > 30_000) {
        1.0
    } else {
        0.0
    };
    out[7] = normalized_count_entropy(port_counts.values().copied());
}

fn file_features(session: &SessionRecord, out: &mut [f64], quality: &mut QualityCounters) {
    let transfers = &session.file_transfers;
    let n = transfers.len();
    out[0] = log1p_norm(n as f64, FILE_TRANSFERS_MAX);
    if n == 0 {
        return;
    }

    let downloads = transfers
        .iter()
        .filter(|t| t.direction == TransferDirection::Download)
        .count();
    out[1] = log1p_norm(downloads as f64, FILE_TRANSFERS_MAX);
    out[2] = log1p_norm((n - downloads) as f64, FILE_TRANSFERS_MAX);

    let total_bytes: u64 = transfers.iter().map(|t| t.size_bytes).sum();
    out[3] = log1p_norm(total_bytes as f64, BYTES_MAX);

    let scanned = transfers.iter().filter(|t| t.malware_detected.is_some()).count();
    if scanned == 0 {
        // No scanner feed configured: unknown, not clean.
        quality.unavailable_signals += 1;
    } else {
        let detected = transfers
            .iter()
            .filter(|t| t.malware_detected == Some(true))
            .count();
        out[4] = ratio(detected as f64, scanned as f64);
    }

    let executables = transfers
        .iter()
        .filter(|t| has_extension(&t.filename, &["sh", "elf", "bin", "py", "pl", "exe"]))
        .count();
    out[5] = ratio(executables as f64, n as f64);
    let archives = transfers
        .iter()
        .filter(|t| has_extension(&t.filename, &["tar", "gz", "tgz", "zip", "xz", "bz2"]))
        .count();
    out[6] = ratio(archives as f64, n as f64);

    let entropy_sum: f64 = transfers.iter().map(|t| normalized_char_entropy(&t.filename)).sum();
    out[7] = entropy_sum / n as f64;
}

fn geographic_features(session: &SessionRecord, out: &mut [f64], quality: &mut QualityCounters) {
    let enrichment = &session.enrichment;
    out[0] = if enrichment.country.is_some() { 1.0 } else { 0.0 };

    for (slot, flag) in [
        (1, enrichment.is_cloud_provider),
        (2, enrichment.is_vpn),
        (3, enrichment.is_tor_exit),
    ] {
        match flag {
            Some(true) => out[slot] = 1.0,
            Some(false) => out[slot] = 0.0,
            None => quality.unavailable_signals += 1,
        }
    }

    let has_coords = enrichment.latitude.is_some() && enrichment.longitude.is_some();
    out[4] = if has_coords { 1.0 } else { 0.0 };
    // Indices 5-7 (spread, country/asn diversity) are cluster-scope and
    // stay 0.0 for a single session.
}

fn password_features(session: &SessionRecord, out: &mut [f64], quality: &mut QualityCounters) {
    let attempts = &session.auth_attempts;
    let n = attempts.len();

    match session.enrichment.breached_passwords {
        Some(breached) if n > 0 => {
            out[0] = ratio(breached as f64, n as f64);
            out[1] = log1p_norm(breached as f64, BREACHED_PASSWORDS_MAX);
        }
        Some(_) => {}
        None => {
            // Breach feed not configured for this record.
            quality.unavailable_signals += 2;
        }
    }

    if n == 0 {
        return;
    }

    let distinct: HashSet<&str> = attempts.iter().map(|a| a.password.as_str()).collect();
    out[2] = ratio(distinct.len() as f64, n as f64);

    let weak = attempts
        .iter()
        .filter(|a| a.password.len() < 6 || is_trivial_password(&a.password))
        .count();
    out[3] = ratio(weak as f64, n as f64);
    // Index 4 (cross-source reuse) is cluster-scope, 0.0 per session.

    let numeric = attempts
        .iter()
        .filter(|a| !a.password.is_empty() && a.password.bytes().all(|b| b.is_ascii_digit()))
        .count();
    out[5] = ratio(numeric as f64, n as f64);
    let alpha = attempts
        .iter()
        .filter(|a| {
            !a.password.is_empty() && a.password.bytes().all(|b| b.is_ascii_lowercase())
        })
        .count();
    out[6] = ratio(alpha as f64, n as f64);

    let entropy_sum: f64 = attempts.iter().map(|a| normalized_char_entropy(&a.password)).sum();
    out[7] = entropy_sum / n as f64;
}

fn keyword_ratio(commands: &[String], keywords: &[&str]) -> f64 {
    let hits = commands
        .iter()
        .filter(|c| keywords.iter().any(|k| c.contains(k)))
        .count();
    ratio(hits as f64, commands.len() as f64)
}

/// Long unbroken base64/hex-looking runs inside a command.
fn has_encoded_blob(command: &str) -> bool {
    let mut run = 0usize;
    for b in command.bytes() {
        if b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=' {
            run += 1;
            if run >= 24 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn has_extension(filename: &str, extensions: &[&str]) -> bool {
    filename
        .rsplit('.')
        .next()
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn is_trivial_password(password: &str) -> bool {
    const TRIVIAL: [&str; 8] = [
        "password", "123456", "admin", "root", "qwerty", "12345678", "letmein", "default",
    ];
    TRIVIAL.contains(&password.to_ascii_lowercase().as_str())
}

fn max_pairwise_km(coords: &[(f64, f64)]) -> f64 {
    let mut max = 0.0f64;
    for (i, &(lat1, lon1)) in coords.iter().enumerate() {
        for &(lat2, lon2) in &coords[i + 1..] {
            let d = haversine_km(lat1, lon1, lat2, lon2);
            if d > max {
                max = d;
            }
        }
    }
    max
}

/// Clamp every component into [0,1]; NaN/Inf become 0.0/1.0 and bump
/// the clamp counter. No malformed value escapes, no record is dropped.
fn sanitize(vector: &mut BehavioralFeatureVector) {
    for value in &mut vector.values {
        let clamped = clamp01(*value);
        if (clamped - *value).abs() > f64::EPSILON || !value.is_finite() {
            vector.quality.clamped_features += 1;
        }
        *value = clamped;
    }
}
