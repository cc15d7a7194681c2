// Analysis module - Click-track beat detection and measure mapping

pub mod beat_detector;
pub mod measure_mapper;

use thiserror::Error;

pub use beat_detector::{BeatAnalysis, BeatDetector, BeatDetectorConfig};
pub use measure_mapper::MeasureMapper;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Could not detect enough beats in the click track (found {found}, need 2)")]
    InsufficientBeats { found: usize },

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),
}
