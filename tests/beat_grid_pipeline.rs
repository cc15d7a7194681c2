use playexl::analysis::{AnalysisError, BeatDetector, MeasureMapper};
use playexl::audio::export::encode_wav;
use playexl::audio::{AudioSource, StemBank};
use playexl::sequencer::timeline::{Tempo, TimeSignature, TimeSignatureChange, TimeSignatureMap};
use playexl::sequencer::ClickTrackRenderer;
use playexl::view::{TimelineConfig, TimelineProjector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const RATE: u32 = 44100;
const HOP_SECS: f64 = 128.0 / RATE as f64;

/// Render a click track, round-trip it through WAV and the stem bank, and
/// return the mono samples the session would analyze
fn click_through_bank(bpm: f64, signatures: &TimeSignatureMap, measures: u32) -> (Vec<f32>, u32, Vec<f64>) {
    let click = ClickTrackRenderer::new(RATE).render(Tempo::new(bpm).unwrap(), signatures, measures, 1.0);
    let wav = encode_wav(&click.samples, RATE, 1).unwrap();

    let bank = StemBank::new(RATE);
    let handle = bank.load(&wav, Some("wav")).unwrap();
    let (samples, rate) = bank.mono_samples(handle).unwrap();
    (samples, rate, click.beat_times)
}

#[test]
fn test_rendered_click_maps_to_signature_changes() {
    let signatures = TimeSignatureMap::new([TimeSignatureChange::new(3, TimeSignature::three_four())]);
    let (samples, rate, truth) = click_through_bank(100.0, &signatures, 6);
    assert_eq!(truth.len(), 4 + 4 + 3 * 4);

    let analysis = BeatDetector::default().detect(&samples, rate).unwrap();
    assert_eq!(analysis.beats.len(), truth.len());
    assert!((analysis.bpm - 100.0).abs() < 1.0, "bpm = {}", analysis.bpm);

    // Each beat is stamped at most one window (plus a hop) before its click
    for (detected, actual) in analysis.beats.iter().zip(&truth) {
        assert!(*detected <= *actual + HOP_SECS);
        assert!(actual - detected < 2048.0 / RATE as f64 + HOP_SECS);
    }

    let grid = MeasureMapper::new(signatures.clone()).map(&analysis.beats);
    assert_eq!(grid.measure_count(), 6);
    let per_measure: Vec<u32> = (1..=6)
        .map(|m| grid.first_beat_of_measure(m).unwrap().beats_in_measure)
        .collect();
    assert_eq!(per_measure, vec![4, 4, 3, 3, 3, 3]);

    let projector = TimelineProjector::new(grid, signatures, TimelineConfig::default());
    let widths: Vec<f64> = projector.measures().iter().map(|m| m.width).collect();
    assert!((widths[0] / widths[2] - 4.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_position_tracking_across_song() {
    let signatures = TimeSignatureMap::default();
    let (samples, rate, _) = click_through_bank(120.0, &signatures, 8);
    let analysis = BeatDetector::default().detect(&samples, rate).unwrap();
    let grid = MeasureMapper::new(signatures).map(&analysis.beats);

    // A quarter beat past the third beat of measure 5
    let m5 = grid.first_beat_of_measure(5).unwrap().time;
    let position = grid.position_at(m5 + 2.25 * analysis.beat_interval).unwrap();
    assert_eq!((position.measure, position.beat), (5, 3));
    assert!(position.sub_beat > 0.1 && position.sub_beat < 0.4);

    // Before the first detected beat there is no position
    assert!(grid.position_at(analysis.beats[0] - 0.01).is_none());
}

#[test]
fn test_jittered_performance_keeps_median_tempo() {
    let mut rng = StdRng::seed_from_u64(7);
    let interval = 0.6;
    let mut samples = vec![0.0f32; (RATE as f64 * 22.0) as usize];
    let mut onsets = Vec::new();

    for k in 0..32 {
        let jitter: f64 = rng.gen_range(-0.008..0.008);
        let onset = 1.0 + k as f64 * interval + jitter;
        onsets.push(onset);
        let start = (onset * RATE as f64) as usize;
        for (i, s) in samples[start..start + 200].iter_mut().enumerate() {
            *s = if i % 2 == 0 { 0.7 } else { -0.7 };
        }
    }

    let analysis = BeatDetector::default().detect(&samples, RATE).unwrap();
    assert_eq!(analysis.beats.len(), onsets.len());
    assert!((analysis.bpm - 100.0).abs() < 2.0, "bpm = {}", analysis.bpm);
}

#[test]
fn test_silent_click_is_reported() {
    let bank = StemBank::new(RATE);
    let wav = encode_wav(&vec![0.0; RATE as usize * 3], RATE, 1).unwrap();
    let handle = bank.load(&wav, None).unwrap();
    let (samples, rate) = bank.mono_samples(handle).unwrap();

    let result = BeatDetector::default().detect(&samples, rate);
    assert_eq!(result, Err(AnalysisError::InsufficientBeats { found: 0 }));
}
