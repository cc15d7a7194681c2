// Audio source - Capability interface over per-track decode + playback
//
// The transport never touches samples directly: it drives handles through
// this trait. `StemBank` is the software implementation; tests wrap it to
// inject failures.

use std::fmt;

use thiserror::Error;

use crate::audio::decoder::DecodeError;

/// Opaque handle to one loaded stem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StemHandle(pub u32);

impl fmt::Display for StemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stem#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Unknown audio handle: {0}")]
    UnknownHandle(StemHandle),

    #[error("Failed to decode audio: {0}")]
    Decode(#[from] DecodeError),

    #[error("Playback error: {0}")]
    Playback(String),
}

/// Decode-and-play capability, one handle per track.
///
/// All methods take `&self`: implementations are shared between the
/// control thread and the position-poll task.
pub trait AudioSource: Send + Sync {
    /// Decode `bytes` and register them as a new stem (stopped, at 0s)
    fn load(&self, bytes: &[u8], hint: Option<&str>) -> Result<StemHandle, SourceError>;

    /// Release a stem
    fn unload(&self, handle: StemHandle) -> Result<(), SourceError>;

    fn play(&self, handle: StemHandle) -> Result<(), SourceError>;

    fn pause(&self, handle: StemHandle) -> Result<(), SourceError>;

    /// Move the play position (seconds), clamped to the stem's duration
    fn seek(&self, handle: StemHandle, seconds: f64) -> Result<(), SourceError>;

    /// Current play position in seconds
    fn current_time(&self, handle: StemHandle) -> Result<f64, SourceError>;

    fn duration(&self, handle: StemHandle) -> Result<f64, SourceError>;

    fn is_playing(&self, handle: StemHandle) -> bool;

    /// Apply live gain ([0, 1]) and pan ([-1, 1])
    fn set_gain(&self, handle: StemHandle, gain: f32, pan: f32) -> Result<(), SourceError>;

    /// Mono downmix of the decoded stem and its sample rate (for analysis)
    fn mono_samples(&self, handle: StemHandle) -> Result<(Vec<f32>, u32), SourceError>;
}
