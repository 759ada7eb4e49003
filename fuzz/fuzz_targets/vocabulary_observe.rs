#![no_main]

use analytics::{CommandVectorizer, CommandVocabulary, VocabularyConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = VocabularyConfig {
        max_size: 256,
        ngram_min: 1,
        ngram_max: 3,
        use_idf: true,
    };

    let mut vocabulary = CommandVocabulary::new();
    let mut commands = Vec::new();
    for chunk in data.chunks(24).take(64) {
        let command = String::from_utf8_lossy(chunk).to_string();
        vocabulary.observe(&command, &config);
        commands.push(command);
    }
    assert!(vocabulary.len() <= config.max_size);

    let before = vocabulary.fingerprint();
    let vectorizer = CommandVectorizer::new(&vocabulary, &config);
    for command in &commands {
        let vector = vectorizer.vectorize(command);
        for (_, weight) in &vector.entries {
            assert!(weight.is_finite() && *weight >= 0.0);
        }
    }
    // Vectorization is read-only.
    assert_eq!(vocabulary.fingerprint(), before);
});
