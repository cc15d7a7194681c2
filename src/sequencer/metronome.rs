// Metronome - Offline click track synthesizer
// Renders sample-accurate clicks (accented downbeats) for a tempo and a
// signature timeline. Used to build reference click tracks for songs that
// lack one, and as ground truth when testing beat detection.

use std::f32::consts::PI;

use super::timeline::{Tempo, TimeSignatureMap};

/// Metronome click type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
    /// Click on first beat of measure (accent/downbeat)
    Accent,
    /// Click on other beats
    Regular,
}

/// Pre-generated click waveforms
#[derive(Debug, Clone)]
pub struct ClickSound {
    accent_samples: Vec<f32>,
    regular_samples: Vec<f32>,
}

impl ClickSound {
    /// Duration of click in milliseconds
    const CLICK_DURATION_MS: f32 = 10.0;

    pub fn new(sample_rate: f32) -> Self {
        let click_samples = ((Self::CLICK_DURATION_MS / 1000.0) * sample_rate) as usize;

        Self {
            accent_samples: Self::generate_click(sample_rate, click_samples, 1200.0, 0.6),
            regular_samples: Self::generate_click(sample_rate, click_samples, 800.0, 0.4),
        }
    }

    /// Generate a short click sound using sine wave with envelope
    /// Higher frequency and amplitude for accent clicks
    fn generate_click(
        sample_rate: f32,
        num_samples: usize,
        frequency: f32,
        amplitude: f32,
    ) -> Vec<f32> {
        let phase_increment = 2.0 * PI * frequency / sample_rate;

        (0..num_samples)
            .map(|i| {
                let t = i as f32 / num_samples as f32;
                let envelope = (-t * 8.0).exp(); // Fast decay
                (i as f32 * phase_increment).sin() * envelope * amplitude
            })
            .collect()
    }

    pub fn get_click(&self, click_type: ClickType) -> &[f32] {
        match click_type {
            ClickType::Accent => &self.accent_samples,
            ClickType::Regular => &self.regular_samples,
        }
    }

    /// Duration of click in samples
    pub fn click_duration(&self) -> usize {
        self.accent_samples.len()
    }
}

/// A rendered click track plus the exact onset of every click
#[derive(Debug, Clone)]
pub struct RenderedClick {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Onset of each click in seconds
    pub beat_times: Vec<f64>,
}

impl RenderedClick {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

pub struct ClickTrackRenderer {
    sample_rate: u32,
    sound: ClickSound,
}

impl ClickTrackRenderer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            sound: ClickSound::new(sample_rate as f32),
        }
    }

    /// Render `measures` measures of clicks, one per counted beat.
    ///
    /// `lead_in_secs` of silence precede the first click; one beat of
    /// silence follows the last.
    pub fn render(
        &self,
        tempo: Tempo,
        signatures: &TimeSignatureMap,
        measures: u32,
        lead_in_secs: f64,
    ) -> RenderedClick {
        let beat_secs = tempo.beat_duration_seconds();
        let rate = self.sample_rate as f64;

        let mut clicks: Vec<(f64, ClickType)> = Vec::new();
        for measure in 1..=measures {
            let beats = signatures.signature_at(measure).beats_per_measure();
            for beat in 1..=beats {
                let time = lead_in_secs.max(0.0) + clicks.len() as f64 * beat_secs;
                let click_type = if beat == 1 {
                    ClickType::Accent
                } else {
                    ClickType::Regular
                };
                clicks.push((time, click_type));
            }
        }

        let end_secs = clicks
            .last()
            .map(|(time, _)| time + beat_secs)
            .unwrap_or(lead_in_secs.max(0.0));
        let total = (end_secs * rate).ceil() as usize + self.sound.click_duration();
        let mut samples = vec![0.0f32; total];

        for &(time, click_type) in &clicks {
            let start = (time * rate).round() as usize;
            for (out, &s) in samples[start..].iter_mut().zip(self.sound.get_click(click_type)) {
                *out += s;
            }
        }

        log::debug!(
            "Rendered {} clicks over {} measures at {}",
            clicks.len(),
            measures,
            tempo
        );

        RenderedClick {
            samples,
            sample_rate: self.sample_rate,
            beat_times: clicks.into_iter().map(|(time, _)| time).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::timeline::{TimeSignature, TimeSignatureChange};

    #[test]
    fn test_click_sound_generation() {
        let sound = ClickSound::new(44100.0);

        let accent = sound.get_click(ClickType::Accent);
        let regular = sound.get_click(ClickType::Regular);

        // 10ms at 44.1kHz
        assert_eq!(accent.len(), 441);
        assert_eq!(accent.len(), regular.len());

        let accent_peak = accent.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
        let regular_peak = regular.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
        assert!(accent_peak > regular_peak);
        assert!(accent_peak <= 0.6);
    }

    #[test]
    fn test_render_follows_signature_changes() {
        let map = TimeSignatureMap::new([TimeSignatureChange::new(3, TimeSignature::three_four())]);
        let renderer = ClickTrackRenderer::new(8000);
        let click = renderer.render(Tempo::new(120.0).unwrap(), &map, 4, 0.25);

        // 4 + 4 + 3 + 3
        assert_eq!(click.beat_times.len(), 14);
        assert_eq!(click.beat_times[0], 0.25);
        assert!((click.beat_times[13] - (0.25 + 13.0 * 0.5)).abs() < 1e-9);
        assert!(click.duration_secs() >= 0.25 + 14.0 * 0.5);

        // Silence between clicks
        let gap = (0.25 + 0.1) * 8000.0;
        assert_eq!(click.samples[gap as usize], 0.0);
    }

    #[test]
    fn test_render_zero_measures() {
        let click = ClickTrackRenderer::new(8000).render(Tempo::default(), &TimeSignatureMap::default(), 0, 0.0);
        assert!(click.beat_times.is_empty());
    }
}
