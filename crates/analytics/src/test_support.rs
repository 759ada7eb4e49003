//! Session builders shared by the detector tests.

use crate::types::{
    AuthAttempt, Enrichment, FileTransferEvent, SessionRecord, TransferDirection,
};

/// 2023-11-14 10:00:00 UTC, a Tuesday. Mid-morning on a weekday so the
/// night/weekend flags stay off unless a test flips them on purpose.
pub(crate) const BASE_TS: i64 = 1_699_956_000;

pub(crate) const COUNTRIES: [&str; 15] = [
    "US", "CN", "RU", "BR", "DE", "IN", "VN", "NL", "FR", "KR", "ID", "TR", "PL", "UA", "MX",
];

pub(crate) fn session(id: &str, ip: &str, start: i64, end: i64) -> SessionRecord {
    SessionRecord {
        session_id: id.to_string(),
        source_ip: ip.to_string(),
        sensor_id: "hp-01".to_string(),
        start_ts_unix: start,
        end_ts_unix: end,
        commands: Vec::new(),
        raw_commands: Vec::new(),
        auth_attempts: Vec::new(),
        dst_ports: Vec::new(),
        bytes_in: 0,
        bytes_out: 0,
        file_transfers: Vec::new(),
        enrichment: Enrichment::default(),
    }
}

pub(crate) fn with_commands(mut record: SessionRecord, commands: &[&str]) -> SessionRecord {
    record.commands = commands.iter().map(|c| c.to_string()).collect();
    record
}

pub(crate) fn attempt(username: &str, password: &str, success: bool) -> AuthAttempt {
    AuthAttempt {
        username: username.to_string(),
        password: password.to_string(),
        success,
    }
}

pub(crate) fn transfer(
    filename: &str,
    size_bytes: u64,
    direction: TransferDirection,
) -> FileTransferEvent {
    FileTransferEvent {
        filename: filename.to_string(),
        size_bytes,
        direction,
        malware_detected: None,
    }
}

/// One session of a distributed low-volume campaign: a single failed
/// root login with a campaign-unique password, from a unique source,
/// fully enriched (15 countries, globe-spanning coordinates, breach
/// feed present).
pub(crate) fn stuffing_session(i: usize, breached: bool) -> SessionRecord {
    let start = BASE_TS + (i as i64) * 40;
    let mut record = session(
        &format!("s{:04}", i),
        &format!("198.51.{}.{}", i / 200, 1 + i % 200),
        start,
        start + 20,
    );
    record.auth_attempts = vec![attempt("root", &format!("pw-{:04}", i), false)];
    record.enrichment = Enrichment {
        country: Some(COUNTRIES[i % COUNTRIES.len()].to_string()),
        asn: Some(64_500 + (i % COUNTRIES.len()) as u32),
        latitude: Some(-55.0 + ((i * 13) % 111) as f64),
        longitude: Some(-170.0 + ((i * 29) % 340) as f64),
        is_cloud_provider: Some(false),
        is_vpn: Some(false),
        is_tor_exit: Some(false),
        breached_passwords: Some(u64::from(breached)),
    };
    record
}

/// A window of `n` such sessions with the given fraction breached.
pub(crate) fn stuffing_window(n: usize, breached_fraction: f64) -> Vec<SessionRecord> {
    let breached = (n as f64 * breached_fraction).round() as usize;
    (0..n).map(|i| stuffing_session(i, i < breached)).collect()
}
