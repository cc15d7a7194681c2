// Beat detector - Energy-based onset detection on the click track
//
// A 2048-sample window slides over the signal in 128-sample hops. Each
// hop's RMS energy is compared with the rolling mean of the last second
// of energies; a beat is registered when it exceeds `mean × threshold`
// and the previous beat is at least `min_separation_secs` old.
//
// The timestamp of a beat is the start of the first window that
// contains the onset, so it lands up to one window before the transient.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisError;
use crate::audio::simd::simd_rms;

/// Detector tuning, loaded from the player config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatDetectorConfig {
    /// Analysis window length in samples
    pub window_size: usize,
    /// Samples between consecutive windows
    pub hop_size: usize,
    /// Energy must exceed `rolling_mean * threshold`
    pub threshold: f32,
    /// Minimum time between two registered beats (suppresses double triggers)
    pub min_separation_secs: f64,
    /// Length of the rolling energy history
    pub history_secs: f64,
    /// Windows with RMS at or below this are never beats (0.0 disables)
    pub energy_floor: f32,
}

impl Default for BeatDetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 128,
            threshold: 0.8,
            min_separation_secs: 0.1,
            history_secs: 1.0,
            energy_floor: 0.0,
        }
    }
}

/// Beat timestamps and tempo estimate
#[derive(Debug, Clone, PartialEq)]
pub struct BeatAnalysis {
    /// Beat times in seconds, strictly increasing
    pub beats: Vec<f64>,
    pub bpm: f64,
    /// Median inter-beat interval in seconds
    pub beat_interval: f64,
}

pub struct BeatDetector {
    config: BeatDetectorConfig,
}

impl BeatDetector {
    pub fn new(config: BeatDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BeatDetectorConfig {
        &self.config
    }

    /// Detect beats in mono `samples` at `sample_rate` Hz
    pub fn detect(&self, samples: &[f32], sample_rate: u32) -> Result<BeatAnalysis, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        let window = self.config.window_size;
        let hop = self.config.hop_size;
        if window == 0 || hop == 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "window_size ({}) and hop_size ({}) must be > 0",
                window, hop
            )));
        }

        let rate = sample_rate as f64;
        let history_len = ((self.config.history_secs * rate / hop as f64).round() as usize).max(1);
        let mut history: VecDeque<f32> = VecDeque::with_capacity(history_len + 1);
        let mut history_sum = 0.0f64;

        let mut beats: Vec<f64> = Vec::new();
        let mut start = 0;

        while start + window < samples.len() {
            let energy = simd_rms(&samples[start..start + window]);

            history.push_back(energy);
            history_sum += energy as f64;
            if history.len() > history_len {
                if let Some(old) = history.pop_front() {
                    history_sum -= old as f64;
                }
            }
            let mean = (history_sum.max(0.0) / history.len() as f64) as f32;

            let time = start as f64 / rate;
            let separated = beats
                .last()
                .is_none_or(|&last| time - last > self.config.min_separation_secs);

            if energy > self.config.energy_floor && energy > mean * self.config.threshold && separated {
                beats.push(time);
            }

            start += hop;
        }

        if beats.len() < 2 {
            return Err(AnalysisError::InsufficientBeats { found: beats.len() });
        }

        let beat_interval = median_interval(&beats);
        log::info!(
            "Detected {} beats, median interval {:.4}s ({:.2} BPM)",
            beats.len(),
            beat_interval,
            60.0 / beat_interval
        );

        Ok(BeatAnalysis {
            bpm: 60.0 / beat_interval,
            beats,
            beat_interval,
        })
    }
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new(BeatDetectorConfig::default())
    }
}

/// Median of consecutive differences; `beats` holds at least two entries
fn median_interval(beats: &[f64]) -> f64 {
    let mut intervals: Vec<f64> = beats.windows(2).map(|w| w[1] - w[0]).collect();
    intervals.sort_by(|a, b| a.total_cmp(b));

    let mid = intervals.len() / 2;
    if intervals.len() % 2 == 0 {
        (intervals[mid - 1] + intervals[mid]) / 2.0
    } else {
        intervals[mid]
    }
}
