// PlayEXL - Stem player library: beat grid analysis, transport, mixer and timeline

pub mod analysis;
pub mod audio;
pub mod config;
pub mod messaging;
pub mod mixer;
pub mod sequencer;
pub mod session;
pub mod view;

// Re-export commonly used types for convenience
pub use analysis::{AnalysisError, BeatAnalysis, BeatDetector, BeatDetectorConfig, MeasureMapper};
pub use audio::engine::AudioEngine;
pub use audio::{AudioSource, DecodedAudio, SourceError, StemBank, StemHandle};
pub use config::PlayerConfig;
pub use messaging::channels::{create_notification_channel, create_position_channel};
pub use mixer::{Mixer, MixerError, TrackState};
pub use sequencer::{
    BeatGrid, ClickTrackRenderer, PlayheadPosition, Tempo, TimeSignature, TimeSignatureMap,
    Transport, TransportError, TransportPhase,
};
pub use session::{GridStatus, Session, SessionError, SongRecord, Track, TrackId, TrackRole};
pub use view::{AutoScroll, TimelineConfig, TimelineProjector};
