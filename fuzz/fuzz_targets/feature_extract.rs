#![no_main]

use analytics::{
    extract, AuthAttempt, Enrichment, FileTransferEvent, SessionRecord, TransferDirection,
    FEATURE_COUNT,
};
use libfuzzer_sys::fuzz_target;

fn bounded_text(data: &[u8], offset: usize, len: usize) -> String {
    let start = offset.min(data.len());
    let end = (start + len).min(data.len());
    String::from_utf8_lossy(&data[start..end]).to_string()
}

fn read_i64(data: &[u8], offset: usize) -> i64 {
    let mut buf = [0u8; 8];
    for (i, slot) in buf.iter_mut().enumerate() {
        *slot = data.get(offset + i).copied().unwrap_or_default();
    }
    i64::from_le_bytes(buf)
}

fuzz_target!(|data: &[u8]| {
    let start = read_i64(data, 0);
    let end = read_i64(data, 8);

    let commands: Vec<String> = (0..data.get(16).copied().unwrap_or_default() % 8)
        .map(|i| bounded_text(data, 32 + i as usize * 24, 24))
        .collect();
    let auth_attempts: Vec<AuthAttempt> = (0..data.get(17).copied().unwrap_or_default() % 6)
        .map(|i| AuthAttempt {
            username: bounded_text(data, 224 + i as usize * 16, 8),
            password: bounded_text(data, 232 + i as usize * 16, 8),
            success: data.get(18 + i as usize).copied().unwrap_or_default() & 1 == 1,
        })
        .collect();
    let file_transfers: Vec<FileTransferEvent> = (0..data.get(24).copied().unwrap_or_default() % 4)
        .map(|i| FileTransferEvent {
            filename: bounded_text(data, 320 + i as usize * 16, 16),
            size_bytes: u64::from(data.get(25 + i as usize).copied().unwrap_or_default()) << 20,
            direction: if data.get(29 + i as usize).copied().unwrap_or_default() & 1 == 1 {
                TransferDirection::Upload
            } else {
                TransferDirection::Download
            },
            malware_detected: match data.get(30 + i as usize).copied().unwrap_or_default() % 3 {
                0 => None,
                1 => Some(false),
                _ => Some(true),
            },
        })
        .collect();

    let session = SessionRecord {
        session_id: bounded_text(data, 384, 16),
        source_ip: bounded_text(data, 400, 16),
        sensor_id: bounded_text(data, 416, 8),
        start_ts_unix: start,
        end_ts_unix: end,
        commands,
        raw_commands: Vec::new(),
        auth_attempts,
        dst_ports: data
            .get(424..440)
            .unwrap_or_default()
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect(),
        bytes_in: u64::from(data.get(440).copied().unwrap_or_default()) << 24,
        bytes_out: u64::from(data.get(441).copied().unwrap_or_default()) << 24,
        file_transfers,
        enrichment: Enrichment {
            country: data.get(442).map(|b| format!("C{}", b % 32)),
            asn: data.get(443).map(|&b| u32::from(b)),
            latitude: data.get(444).map(|&b| f64::from(b) - 128.0),
            longitude: data.get(445).map(|&b| f64::from(b) * 2.0 - 256.0),
            is_cloud_provider: data.get(446).map(|b| b & 1 == 1),
            is_vpn: data.get(447).map(|b| b & 1 == 1),
            is_tor_exit: data.get(448).map(|b| b & 1 == 1),
            breached_passwords: data.get(449).map(|&b| u64::from(b)),
        },
    };

    let vector = extract(&session);
    assert_eq!(vector.values.len(), FEATURE_COUNT);
    for value in vector.values {
        assert!(value.is_finite() && (0.0..=1.0).contains(&value));
    }
});
