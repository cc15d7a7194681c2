// Stem bank - Software AudioSource mixing decoded stems
//
// Every stem keeps its play state in atomics so the control thread can
// seek/play/pause while the audio callback renders. The stem map itself
// sits behind an RwLock that the callback only ever `try_read`s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::audio::decoder::{DecodedAudio, decode};
use crate::audio::dsp_utils::equal_power_pan;
use crate::audio::parameters::AtomicF32;
use crate::audio::source::{AudioSource, SourceError, StemHandle};

struct Stem {
    audio: DecodedAudio,
    /// Play position in frames
    position: AtomicU64,
    playing: AtomicBool,
    gain: AtomicF32,
    pan: AtomicF32,
}

impl Stem {
    fn new(audio: DecodedAudio) -> Self {
        Self {
            audio,
            position: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            gain: AtomicF32::new(1.0),
            pan: AtomicF32::new(0.0),
        }
    }

    fn total_frames(&self) -> u64 {
        self.audio.frames() as u64
    }

    /// Move the position forward by `frames`, stopping at the end.
    /// A seek that lands between the load and the exchange wins.
    fn advance(&self, start: u64, frames: u64) {
        let total = self.total_frames();
        let end = (start + frames).min(total);
        let _ = self
            .position
            .compare_exchange(start, end, Ordering::AcqRel, Ordering::Relaxed);
        if end >= total {
            self.playing.store(false, Ordering::Release);
        }
    }
}

/// In-memory stem player; every stem is resampled to the bank's rate
pub struct StemBank {
    sample_rate: u32,
    stems: RwLock<HashMap<StemHandle, Arc<Stem>>>,
    next_handle: AtomicU32,
}

impl StemBank {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            stems: RwLock::new(HashMap::new()),
            next_handle: AtomicU32::new(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Register already-decoded audio (resampled to the bank rate)
    pub fn insert(&self, audio: DecodedAudio) -> Result<StemHandle, SourceError> {
        let audio = audio.resample(self.sample_rate)?;
        let handle = StemHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));

        log::debug!(
            "Loaded {}: {:.2}s, {} channel(s)",
            handle,
            audio.duration_secs(),
            audio.channels
        );

        let mut stems = self
            .stems
            .write()
            .map_err(|_| SourceError::Playback("stem map poisoned".to_string()))?;
        stems.insert(handle, Arc::new(Stem::new(audio)));
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.stems.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stem(&self, handle: StemHandle) -> Result<Arc<Stem>, SourceError> {
        let stems = self
            .stems
            .read()
            .map_err(|_| SourceError::Playback("stem map poisoned".to_string()))?;
        stems
            .get(&handle)
            .cloned()
            .ok_or(SourceError::UnknownHandle(handle))
    }

    /// Mix every playing stem into `out` (stereo interleaved, overwritten)
    /// and advance their positions.
    ///
    /// Called from the audio callback: never blocks. If the stem map is
    /// being written, the block is silent and positions do not move.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / 2;

        let Ok(stems) = self.stems.try_read() else {
            return;
        };

        for stem in stems.values() {
            if !stem.playing.load(Ordering::Acquire) {
                continue;
            }

            let start = stem.position.load(Ordering::Acquire);
            let total = stem.total_frames();
            let available = total.saturating_sub(start).min(frames as u64) as usize;

            let (pan_left, pan_right) = equal_power_pan(stem.pan.get());
            let gain = stem.gain.get();
            let left_gain = gain * pan_left;
            let right_gain = gain * pan_right;

            for (i, frame) in out.chunks_exact_mut(2).take(available).enumerate() {
                let (left, right) = stem.audio.frame(start as usize + i);
                frame[0] += left * left_gain;
                frame[1] += right * right_gain;
            }

            stem.advance(start, frames as u64);
        }
    }

    /// Advance every playing stem by `frames` without producing audio
    pub fn advance(&self, frames: usize) {
        let Ok(stems) = self.stems.read() else {
            return;
        };
        for stem in stems.values() {
            if stem.playing.load(Ordering::Acquire) {
                let start = stem.position.load(Ordering::Acquire);
                stem.advance(start, frames as u64);
            }
        }
    }

    /// Advance playing stems by a duration in seconds
    pub fn advance_secs(&self, seconds: f64) {
        self.advance((seconds.max(0.0) * self.sample_rate as f64).round() as usize);
    }
}

impl AudioSource for StemBank {
    fn load(&self, bytes: &[u8], hint: Option<&str>) -> Result<StemHandle, SourceError> {
        let audio = decode(bytes, hint)?;
        self.insert(audio)
    }

    fn unload(&self, handle: StemHandle) -> Result<(), SourceError> {
        let mut stems = self
            .stems
            .write()
            .map_err(|_| SourceError::Playback("stem map poisoned".to_string()))?;
        stems
            .remove(&handle)
            .map(|_| ())
            .ok_or(SourceError::UnknownHandle(handle))
    }

    fn play(&self, handle: StemHandle) -> Result<(), SourceError> {
        let stem = self.stem(handle)?;
        stem.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn pause(&self, handle: StemHandle) -> Result<(), SourceError> {
        let stem = self.stem(handle)?;
        stem.playing.store(false, Ordering::Release);
        Ok(())
    }

    fn seek(&self, handle: StemHandle, seconds: f64) -> Result<(), SourceError> {
        let stem = self.stem(handle)?;
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as u64;
        stem.position
            .store(frame.min(stem.total_frames()), Ordering::Release);
        Ok(())
    }

    fn current_time(&self, handle: StemHandle) -> Result<f64, SourceError> {
        let stem = self.stem(handle)?;
        Ok(stem.position.load(Ordering::Acquire) as f64 / self.sample_rate as f64)
    }

    fn duration(&self, handle: StemHandle) -> Result<f64, SourceError> {
        Ok(self.stem(handle)?.audio.duration_secs())
    }

    fn is_playing(&self, handle: StemHandle) -> bool {
        self.stem(handle)
            .map(|s| s.playing.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    fn set_gain(&self, handle: StemHandle, gain: f32, pan: f32) -> Result<(), SourceError> {
        let stem = self.stem(handle)?;
        stem.gain.set(gain.clamp(0.0, 1.0));
        stem.pan.set(pan.clamp(-1.0, 1.0));
        Ok(())
    }

    fn mono_samples(&self, handle: StemHandle) -> Result<(Vec<f32>, u32), SourceError> {
        let stem = self.stem(handle)?;
        Ok((stem.audio.to_mono(), stem.audio.sample_rate))
    }
}
