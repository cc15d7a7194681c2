// Sequencer module
// Musical time, the beat grid, click synthesis and the playback transport

pub mod beat_grid;
pub mod metronome;
pub mod scheduler;
pub mod timeline;
pub mod transport;

pub use beat_grid::{BeatEvent, BeatGrid, PlayheadPosition};
pub use metronome::{ClickTrackRenderer, ClickType, RenderedClick};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, ThreadScheduler};
pub use timeline::{Tempo, TimeSignature, TimeSignatureChange, TimeSignatureMap, TimelineError};
pub use transport::{PlaybackReport, Transport, TransportConfig, TransportError, TransportPhase};
