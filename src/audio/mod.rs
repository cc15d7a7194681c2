// Audio module - Decoding, stem playback and the CPAL output backend

pub mod decoder;
pub mod dsp_utils;
pub mod engine;
pub mod export;
pub mod format_conversion;
pub mod parameters;
pub mod simd;
pub mod source;
pub mod stems;

pub use decoder::{DecodeError, DecodedAudio, decode};
pub use source::{AudioSource, SourceError, StemHandle};
pub use stems::StemBank;
