//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use heddy::voice::{
    DEFAULT_KEYWORDS, KeywordSpotter, SAMPLE_RATE, SpotterState, decode_audio, resample,
    samples_to_wav, wav_to_samples, write_wav,
};

/// Generate sine wave audio samples
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

fn default_spotter() -> KeywordSpotter {
    KeywordSpotter::new(
        DEFAULT_KEYWORDS.iter().map(ToString::to_string).collect(),
        SAMPLE_RATE,
    )
}

#[test]
fn test_spotter_creation() {
    let spotter = KeywordSpotter::new(
        vec!["  Computer ".to_string(), String::new(), "REPLY".to_string()],
        SAMPLE_RATE,
    );

    assert_eq!(spotter.state(), SpotterState::Idle);
    assert_eq!(spotter.keywords(), &["computer", "reply"]);
}

#[test]
fn test_silence_does_not_trigger() {
    let mut spotter = default_spotter();

    assert!(!spotter.process(&generate_silence(1.0)));
    assert_eq!(spotter.state(), SpotterState::Idle);
}

#[test]
fn test_utterance_segmentation() {
    let mut spotter = default_spotter();

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    assert!(!spotter.process(&speech));
    assert_eq!(spotter.state(), SpotterState::Listening);

    // Not enough trailing silence yet
    assert!(!spotter.process(&generate_silence(0.2)));

    let silence = generate_silence(0.4);
    assert!(spotter.process(&silence));

    let utterance = spotter.take_utterance();
    assert_eq!(
        utterance.len(),
        speech.len() + generate_silence(0.2).len() + silence.len()
    );
    assert_eq!(spotter.state(), SpotterState::Idle);
    assert!(spotter.take_utterance().is_empty());
}

#[test]
fn test_speech_resets_silence_counter() {
    let mut spotter = default_spotter();

    spotter.process(&generate_sine_samples(440.0, 0.5, 0.3));
    assert!(!spotter.process(&generate_silence(0.4)));
    spotter.process(&generate_sine_samples(440.0, 0.1, 0.3));

    // 0.4s of fresh silence is below the cutoff again
    assert!(!spotter.process(&generate_silence(0.4)));
    assert_eq!(spotter.state(), SpotterState::Listening);
}

#[test]
fn test_spot_transcript() {
    let spotter = default_spotter();

    assert_eq!(spotter.spot("Computer."), ["computer"]);
    assert_eq!(
        spotter.spot("okay COMPUTER, take a snapshot"),
        ["computer", "snapshot"]
    );
    assert!(spotter.spot("I'll get back to you").is_empty());
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV should have reasonable size
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_wav_roundtrip() {
    let original: Vec<f32> = vec![0.0, 0.5, -0.5, 0.25, -0.25];
    let wav_data = samples_to_wav(&original, SAMPLE_RATE).unwrap();

    let (samples, rate) = wav_to_samples(&wav_data).unwrap();

    assert_eq!(rate, SAMPLE_RATE);
    assert_eq!(samples.len(), original.len());
    for (read, written) in samples.iter().zip(&original) {
        assert!((read - written).abs() < 1e-3, "{read} vs {written}");
    }
}

#[test]
fn test_write_wav_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recorded_audio.wav");
    let samples = generate_sine_samples(440.0, 0.2, 0.3);

    write_wav(&path, &samples, SAMPLE_RATE).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let (decoded, rate) = decode_audio(&bytes).unwrap();
    assert_eq!(rate, SAMPLE_RATE);
    assert_eq!(decoded.len(), samples.len());
}

#[test]
fn test_resample_upsamples() {
    let samples = generate_sine_samples(440.0, 1.0, 0.3);

    let out = resample(&samples, SAMPLE_RATE, 48000).unwrap();

    // Tail padding adds at most one chunk's worth of output
    assert!(out.len() >= samples.len() * 3, "{}", out.len());
    assert!(out.len() <= samples.len() * 3 + 3 * 1024, "{}", out.len());
}

#[test]
fn test_resample_same_rate_is_identity() {
    let samples = generate_sine_samples(440.0, 0.1, 0.3);
    assert_eq!(resample(&samples, SAMPLE_RATE, SAMPLE_RATE).unwrap(), samples);
}
