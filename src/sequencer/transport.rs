// Transport - Multi-stem playback control and position reporting
//
// The click track is the reference clock. Every stem is started, paused
// and seeked through the `AudioSource`; once started, stems free-run and
// are only re-aligned at seek/jump/stop boundaries. A repeating poll task
// reads the click position and publishes measure/beat/sub-beat.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ringbuf::traits::Producer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::beat_grid::{BeatGrid, PlayheadPosition};
use super::scheduler::{Scheduler, TaskHandle};
use crate::audio::parameters::{AtomicF32, AtomicF64};
use crate::audio::source::{AudioSource, StemHandle};
use crate::messaging::channels::{NotificationProducer, PositionProducer, push_notification};
use crate::messaging::notification::{Notification, NotificationCategory, PositionUpdate};
use crate::mixer::{Gain, Mixer, MixerError, TrackState};
use crate::session::track::{Track, TrackId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("No song loaded")]
    NotLoaded,

    #[error("Seek target {target:.3}s is beyond the end of the click track ({limit:.3}s)")]
    SeekOutOfRange { target: f64, limit: f64 },

    #[error("No click track: measure display and jump-to-measure are disabled")]
    NoClickTrack,

    #[error("No beat grid available for this song")]
    NoBeatGrid,

    #[error("Measure {0} is not in the beat grid")]
    MeasureNotFound(u32),

    #[error(transparent)]
    Mixer(#[from] MixerError),
}

/// Transport timing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Position display refresh interval
    pub poll_interval_ms: u64,
    /// Added to a measure's first beat when jumping, so the target never
    /// sits exactly on a beat line
    pub jump_offset_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            jump_offset_ms: 10,
        }
    }
}

/// Playback state machine: Idle → Loaded → Playing ⇄ Paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TransportPhase {
    #[default]
    Idle = 0,
    Loaded = 1,
    Playing = 2,
    Paused = 3,
}

impl TransportPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportPhase::Loaded,
            2 => TransportPhase::Playing,
            3 => TransportPhase::Paused,
            _ => TransportPhase::Idle,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, TransportPhase::Playing)
    }

    /// A song is bound (any phase but Idle)
    pub fn is_loaded(&self) -> bool {
        !matches!(self, TransportPhase::Idle)
    }
}

/// Shared transport state
/// Written by the control thread and the poll task, read by anyone
#[derive(Debug, Default)]
pub struct SharedTransportState {
    phase: AtomicU8,
    current_time: AtomicF64,
    measure: AtomicU32,
    beat: AtomicU32,
    sub_beat: AtomicF32,
    loop_hold: AtomicBool,
    /// 0 = no target
    loop_target: AtomicU32,
}

impl SharedTransportState {
    pub fn new() -> Arc<Self> {
        let state = Self::default();
        state.set_position(PlayheadPosition::START);
        Arc::new(state)
    }

    pub fn phase(&self) -> TransportPhase {
        TransportPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: TransportPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Reference time in seconds, as of the last update
    pub fn current_time(&self) -> f64 {
        self.current_time.get()
    }

    fn set_current_time(&self, seconds: f64) {
        self.current_time.set(seconds);
    }

    pub fn position(&self) -> PlayheadPosition {
        PlayheadPosition {
            measure: self.measure.load(Ordering::Relaxed),
            beat: self.beat.load(Ordering::Relaxed),
            sub_beat: self.sub_beat.get() as f64,
        }
    }

    fn set_position(&self, position: PlayheadPosition) {
        self.measure.store(position.measure, Ordering::Relaxed);
        self.beat.store(position.beat, Ordering::Relaxed);
        self.sub_beat.set(position.sub_beat as f32);
    }

    pub fn loop_hold(&self) -> bool {
        self.loop_hold.load(Ordering::Relaxed)
    }

    fn set_loop_hold(&self, enabled: bool) {
        self.loop_hold.store(enabled, Ordering::Relaxed);
    }

    pub fn loop_target(&self) -> Option<u32> {
        match self.loop_target.load(Ordering::Relaxed) {
            0 => None,
            measure => Some(measure),
        }
    }

    fn set_loop_target(&self, measure: Option<u32>) {
        self.loop_target.store(measure.unwrap_or(0), Ordering::Relaxed);
    }
}

/// Which tracks actually started on `play()`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    pub started: Vec<TrackId>,
    pub failed: Vec<(TrackId, String)>,
}

impl PlaybackReport {
    /// Some track failed to start; playback continues without it
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Everything the poll task needs, shared with it by Arc
struct PollContext {
    source: Arc<dyn AudioSource>,
    reference: StemHandle,
    grid: Option<Arc<BeatGrid>>,
    shared: Arc<SharedTransportState>,
    position_tx: Option<Arc<Mutex<PositionProducer>>>,
}

impl PollContext {
    /// Read the reference clock and publish the grid position
    fn refresh(&self) {
        let time = match self.source.current_time(self.reference) {
            Ok(time) => time,
            Err(e) => {
                log::debug!("Position poll failed: {}", e);
                return;
            }
        };
        self.shared.set_current_time(time);

        let Some(grid) = &self.grid else {
            return;
        };
        let position = grid.position_at(time).unwrap_or(PlayheadPosition::START);
        self.shared.set_position(position);

        if let Some(tx) = &self.position_tx {
            if let Ok(mut tx) = tx.try_lock() {
                let update = PositionUpdate {
                    time,
                    measure: position.measure,
                    beat: position.beat,
                    sub_beat: position.sub_beat,
                };
                if tx.try_push(update).is_err() {
                    log::trace!("Position channel full, update at {:.3}s dropped", time);
                }
            }
        }
    }
}

/// Transport controller
/// Owns the loaded tracks, the mixer state and the position poll
pub struct Transport {
    source: Arc<dyn AudioSource>,
    scheduler: Arc<dyn Scheduler>,
    config: TransportConfig,
    shared: Arc<SharedTransportState>,
    mixer: Mixer,
    click: Option<Track>,
    tracks: Vec<Track>,
    grid: Option<Arc<BeatGrid>>,
    click_muted: bool,
    poll: Option<TaskHandle>,
    /// Started handle the position is read from: the click when it runs,
    /// otherwise the longest running track
    clock: Option<StemHandle>,
    /// Handles whose position matches the reference clock
    in_sync: HashSet<StemHandle>,
    notification_tx: Option<Arc<Mutex<NotificationProducer>>>,
    position_tx: Option<Arc<Mutex<PositionProducer>>>,
}

impl Transport {
    pub fn new(
        source: Arc<dyn AudioSource>,
        scheduler: Arc<dyn Scheduler>,
        config: TransportConfig,
    ) -> Self {
        Self {
            source,
            scheduler,
            config,
            shared: SharedTransportState::new(),
            mixer: Mixer::new(),
            click: None,
            tracks: Vec::new(),
            grid: None,
            click_muted: false,
            poll: None,
            clock: None,
            in_sync: HashSet::new(),
            notification_tx: None,
            position_tx: None,
        }
    }

    /// Report recoverable errors to a UI notification channel
    pub fn with_notifications(mut self, tx: Arc<Mutex<NotificationProducer>>) -> Self {
        self.notification_tx = Some(tx);
        self
    }

    /// Publish a `PositionUpdate` on every poll tick
    pub fn with_position_updates(mut self, tx: Arc<Mutex<PositionProducer>>) -> Self {
        self.position_tx = Some(tx);
        self
    }

    /// Get shared state (for passing to a display thread)
    pub fn shared_state(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.shared)
    }

    pub fn phase(&self) -> TransportPhase {
        self.shared.phase()
    }

    pub fn current_time(&self) -> f64 {
        self.shared.current_time()
    }

    pub fn position(&self) -> PlayheadPosition {
        self.shared.position()
    }

    /// "measure.beat.sixteenth", e.g. "12.3.2"
    pub fn position_display(&self) -> String {
        self.shared.position().to_string()
    }

    pub fn grid(&self) -> Option<&BeatGrid> {
        self.grid.as_deref()
    }

    pub fn click_track(&self) -> Option<&Track> {
        self.click.as_ref()
    }

    /// Non-click tracks, in load order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn track_state(&self, id: &TrackId) -> Option<&TrackState> {
        self.mixer.state(id)
    }

    pub fn loop_hold(&self) -> bool {
        self.shared.loop_hold()
    }

    pub fn loop_target(&self) -> Option<u32> {
        self.shared.loop_target()
    }

    pub fn is_click_muted(&self) -> bool {
        self.click_muted
    }

    /// Bind tracks and (optionally) a beat grid; every position goes to 0.
    ///
    /// The first track with the click role becomes the reference clock.
    /// Without one the grid is discarded and tracks play free-running.
    pub fn load(&mut self, tracks: Vec<Track>, grid: Option<BeatGrid>) {
        self.unload();

        for track in tracks {
            if track.role.is_click() && self.click.is_none() {
                self.click = Some(track);
            } else {
                if track.role.is_click() {
                    log::warn!("Extra click track {} treated as a regular track", track.id);
                }
                self.mixer.add_track(track.id.clone());
                self.tracks.push(track);
            }
        }

        let has_click = self.click.is_some();
        if !has_click {
            self.warn(TransportError::NoClickTrack.to_string());
        } else if grid.is_none() {
            self.warn(TransportError::NoBeatGrid.to_string());
        }
        self.grid = grid.filter(|_| has_click).map(Arc::new);

        self.seek_all(0.0);
        self.apply_gains();
        self.shared.set_current_time(0.0);
        self.shared.set_position(PlayheadPosition::START);
        self.shared.set_loop_target(None);
        self.shared.set_phase(TransportPhase::Loaded);

        log::info!(
            "Transport loaded: {} track(s), click: {}, grid: {} beats",
            self.tracks.len(),
            self.click.as_ref().map(|c| c.id.to_string()).unwrap_or_else(|| "none".to_string()),
            self.grid.as_ref().map(|g| g.len()).unwrap_or(0)
        );
    }

    /// Stop everything and forget the loaded song. Handles are not
    /// released; that belongs to whoever loaded them.
    pub fn unload(&mut self) {
        self.cancel_poll();
        self.pause_all();
        self.click = None;
        self.tracks.clear();
        self.grid = None;
        self.mixer.clear();
        self.clock = None;
        self.in_sync.clear();
        self.shared.set_current_time(0.0);
        self.shared.set_position(PlayheadPosition::START);
        self.shared.set_phase(TransportPhase::Idle);
    }

    /// Start the click plus every audible track from the reference time
    pub fn play(&mut self) -> Result<PlaybackReport, TransportError> {
        match self.phase() {
            TransportPhase::Idle => return Err(TransportError::NotLoaded),
            TransportPhase::Playing => return Ok(PlaybackReport::default()),
            _ => {}
        }

        if !self.shared.loop_hold() {
            self.shared.set_loop_target(None);
        }

        self.apply_gains();
        let report = self.start_audible();

        self.shared.set_phase(TransportPhase::Playing);
        self.start_poll();

        if report.is_degraded() {
            log::warn!(
                "Playback degraded: {} of {} track(s) failed to start",
                report.failed.len(),
                report.failed.len() + report.started.len()
            );
        }
        Ok(report)
    }

    /// Pause every handle in place
    pub fn pause(&mut self) -> Result<(), TransportError> {
        match self.phase() {
            TransportPhase::Idle => return Err(TransportError::NotLoaded),
            TransportPhase::Playing => {}
            _ => return Ok(()),
        }

        self.cancel_poll();
        self.pause_all();
        self.shared.set_current_time(self.reference_time());
        self.shared.set_phase(TransportPhase::Paused);
        Ok(())
    }

    /// Play if paused/loaded, pause if playing
    pub fn toggle(&mut self) -> Result<(), TransportError> {
        if self.phase().is_playing() {
            self.pause()
        } else {
            self.play().map(|_| ())
        }
    }

    /// Pause everything, then return to the held measure (loop hold with
    /// a target) or to the start
    pub fn stop(&mut self) -> Result<(), TransportError> {
        if self.phase() == TransportPhase::Idle {
            return Err(TransportError::NotLoaded);
        }

        self.cancel_poll();
        self.pause_all();
        self.shared.set_phase(TransportPhase::Loaded);

        let held = self
            .shared
            .loop_target()
            .filter(|_| self.shared.loop_hold())
            .and_then(|measure| self.measure_start(measure).ok());

        match held {
            Some(time) => self.resync(time),
            None => {
                self.seek_all(0.0);
                self.shared.set_current_time(0.0);
                self.shared.set_position(PlayheadPosition::START);
            }
        }
        Ok(())
    }

    /// Move every track to `seconds`. Negative targets clamp to 0; targets
    /// at or past the end of the click track are rejected.
    pub fn seek(&mut self, seconds: f64) -> Result<(), TransportError> {
        if self.phase() == TransportPhase::Idle {
            return Err(TransportError::NotLoaded);
        }
        let target = self.check_range(seconds)?;
        self.resync(target);
        Ok(())
    }

    /// Seek to just after the first beat of `measure` and remember it as
    /// the loop-hold target
    pub fn jump_to_measure(&mut self, measure: u32) -> Result<(), TransportError> {
        if self.phase() == TransportPhase::Idle {
            return Err(TransportError::NotLoaded);
        }
        let start = self.measure_start(measure)?;
        let target = self.check_range(start)?;

        self.shared.set_loop_target(Some(measure));
        self.resync(target);
        log::info!("Jumped to measure {} ({:.3}s)", measure, target);
        Ok(())
    }

    /// Run the display refresh once, regardless of phase
    pub fn poll_now(&self) {
        if let Some(context) = self.poll_context() {
            context.refresh();
        }
    }

    pub fn set_loop_hold(&mut self, enabled: bool) {
        self.shared.set_loop_hold(enabled);
    }

    /// The click keeps running as the clock; muting only silences it
    pub fn set_click_muted(&mut self, muted: bool) {
        self.click_muted = muted;
        self.apply_gains();
    }

    pub fn set_mute(&mut self, id: &TrackId, muted: bool) -> Result<(), TransportError> {
        self.mixer.set_mute(id, muted)?;
        self.mix_changed();
        Ok(())
    }

    pub fn set_solo(&mut self, id: &TrackId, soloed: bool) -> Result<(), TransportError> {
        self.mixer.set_solo(id, soloed)?;
        self.mix_changed();
        Ok(())
    }

    pub fn set_volume(&mut self, id: &TrackId, volume: f32) -> Result<(), TransportError> {
        self.mixer.set_volume(id, volume)?;
        self.apply_gains();
        Ok(())
    }

    pub fn set_pan(&mut self, id: &TrackId, pan: f32) -> Result<(), TransportError> {
        self.mixer.set_pan(id, pan)?;
        self.apply_gains();
        Ok(())
    }

    /// Length of the song as far as seeking is concerned
    pub fn duration(&self) -> f64 {
        match &self.click {
            Some(click) => click.duration_secs,
            None => self
                .tracks
                .iter()
                .map(|t| t.duration_secs)
                .fold(0.0, f64::max),
        }
    }

    /// The reference clock has run off the end of its stem
    pub fn is_finished(&self) -> bool {
        match self.reference_handle() {
            Some(handle) => {
                self.phase().is_playing()
                    && !self.source.is_playing(handle)
                    && self.reference_time() >= self.duration() - 1e-6
            }
            None => false,
        }
    }

    fn measure_start(&self, measure: u32) -> Result<f64, TransportError> {
        if self.click.is_none() {
            return Err(TransportError::NoClickTrack);
        }
        let grid = self.grid.as_ref().ok_or(TransportError::NoBeatGrid)?;
        let beat = grid
            .first_beat_of_measure(measure)
            .ok_or(TransportError::MeasureNotFound(measure))?;
        Ok(beat.time + self.config.jump_offset_ms as f64 / 1000.0)
    }

    fn check_range(&self, seconds: f64) -> Result<f64, TransportError> {
        let limit = self.duration();
        if !seconds.is_finite() || seconds >= limit {
            let error = TransportError::SeekOutOfRange {
                target: seconds,
                limit,
            };
            self.warn(error.to_string());
            return Err(error);
        }
        Ok(seconds.max(0.0))
    }

    /// Before anything has started every handle sits at the same offset,
    /// so the click (or the first track) stands in for the clock
    fn reference_handle(&self) -> Option<StemHandle> {
        self.clock.or_else(|| {
            self.click
                .as_ref()
                .or_else(|| self.tracks.first())
                .map(|t| t.handle)
        })
    }

    fn reference_time(&self) -> f64 {
        self.reference_handle()
            .and_then(|h| self.source.current_time(h).ok())
            .unwrap_or(0.0)
    }

    fn all_handles(&self) -> impl Iterator<Item = &Track> {
        self.click.iter().chain(self.tracks.iter())
    }

    /// Align every handle on `seconds`, pausing and resuming around the
    /// writes when playing so no stem restarts from a stale offset
    fn resync(&mut self, seconds: f64) {
        let was_playing = self.phase().is_playing();

        self.cancel_poll();
        if was_playing {
            self.pause_all();
        }

        self.seek_all(seconds);
        self.shared.set_current_time(seconds);
        let position = self
            .grid
            .as_ref()
            .and_then(|g| g.position_at(seconds))
            .unwrap_or(PlayheadPosition::START);
        self.shared.set_position(position);

        if was_playing {
            let report = self.start_audible();
            if report.is_degraded() {
                log::warn!("{} track(s) failed to resume after seek", report.failed.len());
            }
            self.start_poll();
        }
    }

    fn seek_all(&mut self, seconds: f64) {
        let mut synced = HashSet::new();
        for track in self.all_handles() {
            match self.source.seek(track.handle, seconds) {
                Ok(()) => {
                    synced.insert(track.handle);
                }
                Err(e) => log::warn!("Failed to seek track {}: {}", track.id, e),
            }
        }
        self.in_sync = synced;
    }

    fn pause_all(&self) {
        for track in self.all_handles() {
            if let Err(e) = self.source.pause(track.handle) {
                log::warn!("Failed to pause track {}: {}", track.id, e);
            }
        }
    }

    /// Start the click and every audible track. Tracks whose position went
    /// stale while they were not running are first moved to the clock.
    fn start_audible(&mut self) -> PlaybackReport {
        let reference = self.reference_time();
        let mut report = PlaybackReport::default();
        let mut started = HashSet::new();

        let to_start: Vec<&Track> = self
            .click
            .iter()
            .chain(self.tracks.iter().filter(|t| self.mixer.is_audible(&t.id)))
            .collect();

        for track in to_start {
            if !self.in_sync.contains(&track.handle) {
                if let Err(e) = self.source.seek(track.handle, reference) {
                    log::warn!("Failed to resync track {}: {}", track.id, e);
                }
            }
            match self.source.play(track.handle) {
                Ok(()) => {
                    started.insert(track.handle);
                    report.started.push(track.id.clone());
                }
                Err(e) => {
                    let message = format!("Track {} failed to start: {}", track.id, e);
                    log::error!("{}", message);
                    if let Some(tx) = &self.notification_tx {
                        push_notification(tx, Notification::error(NotificationCategory::Track, message));
                    }
                    report.failed.push((track.id.clone(), e.to_string()));
                }
            }
        }

        self.clock = self
            .click
            .as_ref()
            .filter(|click| started.contains(&click.handle))
            .or_else(|| {
                self.tracks
                    .iter()
                    .filter(|t| started.contains(&t.handle))
                    .max_by(|a, b| a.duration_secs.total_cmp(&b.duration_secs))
            })
            .map(|t| t.handle);
        if let Some(click) = &self.click {
            if !started.contains(&click.handle) && self.clock.is_some() {
                log::warn!("Click track did not start; following track position instead");
            }
        }

        self.in_sync = started;
        report
    }

    /// Push current gains to every handle
    fn apply_gains(&self) {
        if let Some(click) = &self.click {
            let gain = if self.click_muted { 0.0 } else { 1.0 };
            if let Err(e) = self.source.set_gain(click.handle, gain, 0.0) {
                log::warn!("Failed to set click gain: {}", e);
            }
        }
        for track in &self.tracks {
            let Gain { gain, pan } = self.mixer.effective_gain(&track.id).unwrap_or(Gain::SILENT);
            if let Err(e) = self.source.set_gain(track.handle, gain, pan) {
                log::warn!("Failed to set gain on track {}: {}", track.id, e);
            }
        }
    }

    /// Audibility may have changed: update gains and, while playing, start
    /// tracks that just became audible at the click position
    fn mix_changed(&mut self) {
        self.apply_gains();
        if !self.phase().is_playing() {
            return;
        }

        let reference = self.reference_time();
        let mut joined = Vec::new();
        for track in &self.tracks {
            if !self.mixer.is_audible(&track.id) || self.source.is_playing(track.handle) {
                continue;
            }
            if let Err(e) = self.source.seek(track.handle, reference) {
                log::warn!("Failed to resync track {}: {}", track.id, e);
                continue;
            }
            match self.source.play(track.handle) {
                Ok(()) => {
                    joined.push(track.handle);
                    log::debug!("Track {} joined playback at {:.3}s", track.id, reference);
                }
                Err(e) => self.warn(format!("Track {} failed to start: {}", track.id, e)),
            }
        }

        self.in_sync.extend(joined.iter().copied());
        // Nothing was running: the first track to join becomes the clock
        if self.clock.is_none() {
            if let Some(&handle) = joined.first() {
                self.clock = Some(handle);
                self.start_poll();
            }
        }
    }

    fn poll_context(&self) -> Option<PollContext> {
        Some(PollContext {
            source: Arc::clone(&self.source),
            reference: self.reference_handle()?,
            grid: self.grid.clone(),
            shared: Arc::clone(&self.shared),
            position_tx: self.position_tx.clone(),
        })
    }

    fn start_poll(&mut self) {
        self.cancel_poll();
        let Some(context) = self.poll_context() else {
            return;
        };

        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        self.poll = Some(self.scheduler.schedule_repeating(
            interval,
            Box::new(move || {
                // A tick that lands after stop/pause must not move the display
                if context.shared.phase().is_playing() {
                    context.refresh();
                }
            }),
        ));
    }

    fn cancel_poll(&mut self) {
        if let Some(mut poll) = self.poll.take() {
            poll.cancel();
        }
    }

    fn warn(&self, message: String) {
        log::warn!("{}", message);
        if let Some(tx) = &self.notification_tx {
            push_notification(tx, Notification::warning(NotificationCategory::Transport, message));
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.cancel_poll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MeasureMapper;
    use crate::audio::decoder::DecodedAudio;
    use crate::audio::stems::StemBank;
    use crate::sequencer::scheduler::ManualScheduler;
    use crate::session::track::TrackRole;

    const RATE: u32 = 1000;

    struct Rig {
        bank: Arc<StemBank>,
        scheduler: Arc<ManualScheduler>,
        transport: Transport,
        click: StemHandle,
        piano: StemHandle,
        bass: StemHandle,
    }

    fn stem(bank: &StemBank, seconds: f64) -> StemHandle {
        let frames = (seconds * RATE as f64) as usize;
        bank.insert(DecodedAudio::new(vec![0.1; frames], RATE, 1)).unwrap()
    }

    /// 10s click with a beat every 0.5s in 4/4, plus two 10s stems
    fn rig() -> Rig {
        let bank = Arc::new(StemBank::new(RATE));
        let scheduler = Arc::new(ManualScheduler::new());
        let click = stem(&bank, 10.0);
        let piano = stem(&bank, 10.0);
        let bass = stem(&bank, 10.0);

        let beats: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let grid = MeasureMapper::default().map(&beats);

        let mut transport = Transport::new(bank.clone(), scheduler.clone(), TransportConfig::default());
        transport.load(
            vec![
                Track::new(TrackId::from("click"), TrackRole::Click, click, 10.0),
                Track::new(TrackId::from("piano"), TrackRole::Piano, piano, 10.0),
                Track::new(TrackId::from("bass"), TrackRole::parse("bass"), bass, 10.0),
            ],
            Some(grid),
        );

        Rig {
            bank,
            scheduler,
            transport,
            click,
            piano,
            bass,
        }
    }

    #[test]
    fn test_load_resets_state() {
        let rig = rig();
        assert_eq!(rig.transport.phase(), TransportPhase::Loaded);
        assert_eq!(rig.transport.tracks().len(), 2);
        assert_eq!(rig.transport.click_track().unwrap().handle, rig.click);
        assert_eq!(rig.transport.position(), PlayheadPosition::START);
        assert_eq!(rig.bank.current_time(rig.piano).unwrap(), 0.0);
        assert!(rig.transport.mixer().is_audible(&TrackId::from("piano")));
    }

    #[test]
    fn test_play_starts_click_and_audible_tracks() {
        let mut rig = rig();
        rig.transport.set_mute(&TrackId::from("bass"), true).unwrap();

        let report = rig.transport.play().unwrap();
        assert_eq!(report.started, vec![TrackId::from("click"), TrackId::from("piano")]);
        assert!(!report.is_degraded());
        assert!(rig.bank.is_playing(rig.click));
        assert!(rig.bank.is_playing(rig.piano));
        assert!(!rig.bank.is_playing(rig.bass));
        assert_eq!(rig.transport.phase(), TransportPhase::Playing);
    }

    #[test]
    fn test_poll_tick_reports_position() {
        let mut rig = rig();
        rig.transport.play().unwrap();

        rig.bank.advance_secs(2.25);
        rig.scheduler.tick(Duration::from_millis(50));

        let position = rig.transport.position();
        assert_eq!((position.measure, position.beat), (2, 1));
        assert!((position.sub_beat - 0.5).abs() < 1e-3);
        assert!((rig.transport.current_time() - 2.25).abs() < 1e-9);
        assert_eq!(rig.transport.position_display(), "2.1.3");
    }

    #[test]
    fn test_jump_to_measure_round_trip() {
        let mut rig = rig();
        rig.transport.jump_to_measure(3).unwrap();
        rig.transport.poll_now();

        let position = rig.transport.position();
        assert_eq!((position.measure, position.beat), (3, 1));
        assert_eq!(rig.transport.loop_target(), Some(3));
        // measure 3 starts at beat index 8 = 4.0s, plus the 10ms offset
        for handle in [rig.click, rig.piano, rig.bass] {
            assert!((rig.bank.current_time(handle).unwrap() - 4.01).abs() < 1e-9);
        }
    }

    #[test]
    fn test_jump_errors() {
        let mut rig = rig();
        assert_eq!(rig.transport.jump_to_measure(6), Err(TransportError::MeasureNotFound(6)));
        assert_eq!(rig.transport.jump_to_measure(0), Err(TransportError::MeasureNotFound(0)));

        let mut idle = Transport::new(rig.bank.clone(), rig.scheduler.clone(), TransportConfig::default());
        assert_eq!(idle.jump_to_measure(1), Err(TransportError::NotLoaded));
        assert!(idle.play().is_err());
    }

    #[test]
    fn test_seek_past_end_is_rejected() {
        let mut rig = rig();
        rig.transport.seek(3.0).unwrap();
        let before = rig.transport.current_time();

        let result = rig.transport.seek(10.0);
        assert!(matches!(result, Err(TransportError::SeekOutOfRange { .. })));
        assert_eq!(rig.transport.current_time(), before);
        assert!((rig.bank.current_time(rig.piano).unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_while_playing_keeps_tracks_aligned() {
        let mut rig = rig();
        rig.transport.play().unwrap();
        rig.bank.advance_secs(1.0);

        rig.transport.seek(6.0).unwrap();
        assert_eq!(rig.transport.phase(), TransportPhase::Playing);
        for handle in [rig.click, rig.piano, rig.bass] {
            assert!(rig.bank.is_playing(handle));
            assert!((rig.bank.current_time(handle).unwrap() - 6.0).abs() < 1e-9);
        }
        assert_eq!(rig.scheduler.active_tasks(), 1);
    }

    #[test]
    fn test_stop_without_hold_rewinds() {
        let mut rig = rig();
        rig.transport.jump_to_measure(2).unwrap();
        rig.transport.play().unwrap();
        // hold is off: play forgets the jump target
        assert_eq!(rig.transport.loop_target(), None);

        rig.bank.advance_secs(1.0);
        rig.transport.stop().unwrap();

        assert_eq!(rig.transport.phase(), TransportPhase::Loaded);
        assert_eq!(rig.transport.position(), PlayheadPosition::START);
        assert_eq!(rig.bank.current_time(rig.click).unwrap(), 0.0);
        assert!(!rig.bank.is_playing(rig.click));
        assert_eq!(rig.scheduler.active_tasks(), 0);
    }

    #[test]
    fn test_stop_with_hold_returns_to_measure() {
        let mut rig = rig();
        rig.transport.set_loop_hold(true);
        rig.transport.jump_to_measure(2).unwrap();
        rig.transport.play().unwrap();
        rig.bank.advance_secs(3.0);

        rig.transport.stop().unwrap();
        let position = rig.transport.position();
        assert_eq!((position.measure, position.beat), (2, 1));
        assert!((rig.bank.current_time(rig.bass).unwrap() - 2.01).abs() < 1e-9);
        assert_eq!(rig.transport.loop_target(), Some(2));
    }

    #[test]
    fn test_pause_freezes_and_stale_tick_is_ignored() {
        let mut rig = rig();
        rig.transport.play().unwrap();
        rig.bank.advance_secs(1.0);
        rig.transport.pause().unwrap();

        assert_eq!(rig.transport.phase(), TransportPhase::Paused);
        assert!((rig.transport.current_time() - 1.0).abs() < 1e-9);

        rig.bank.advance_secs(1.0);
        rig.scheduler.tick(Duration::from_millis(500));
        assert_eq!(rig.transport.position(), PlayheadPosition::START);
        assert!(!rig.bank.is_playing(rig.piano));
    }

    #[test]
    fn test_unmute_mid_playback_joins_at_click_time() {
        let mut rig = rig();
        let bass = TrackId::from("bass");
        rig.transport.set_mute(&bass, true).unwrap();
        rig.transport.play().unwrap();
        rig.bank.advance_secs(1.5);

        rig.transport.set_mute(&bass, false).unwrap();
        assert!(rig.bank.is_playing(rig.bass));
        assert!((rig.bank.current_time(rig.bass).unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_stale_track_resynced_on_play() {
        let mut rig = rig();
        let bass = TrackId::from("bass");
        rig.transport.set_solo(&TrackId::from("piano"), true).unwrap();
        rig.transport.play().unwrap();
        rig.bank.advance_secs(2.0);
        rig.transport.pause().unwrap();

        // bass sat at 0 while the others ran; it must join at 2.0
        rig.transport.set_solo(&TrackId::from("piano"), false).unwrap();
        assert!(rig.transport.mixer().is_audible(&bass));
        rig.transport.play().unwrap();
        assert!((rig.bank.current_time(rig.bass).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_mute_keeps_clock() {
        let mut rig = rig();
        rig.transport.set_click_muted(true);
        rig.transport.play().unwrap();
        assert!(rig.bank.is_playing(rig.click));

        let mut out = vec![0.0f32; 200];
        rig.transport.set_mute(&TrackId::from("piano"), true).unwrap();
        rig.transport.set_mute(&TrackId::from("bass"), true).unwrap();
        rig.bank.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!((rig.bank.current_time(rig.click).unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_no_click_track_plays_free_running() {
        let bank = Arc::new(StemBank::new(RATE));
        let scheduler = Arc::new(ManualScheduler::new());
        let piano = stem(&bank, 4.0);

        let mut transport = Transport::new(bank.clone(), scheduler, TransportConfig::default());
        transport.load(
            vec![Track::new(TrackId::from("piano"), TrackRole::Piano, piano, 4.0)],
            None,
        );

        assert!(transport.grid().is_none());
        assert_eq!(transport.jump_to_measure(1), Err(TransportError::NoClickTrack));
        transport.play().unwrap();
        assert!(bank.is_playing(piano));
        transport.seek(1.0).unwrap();
        assert!(transport.seek(4.0).is_err());
    }

    #[test]
    fn test_no_click_clock_follows_running_track() {
        let bank = Arc::new(StemBank::new(RATE));
        let scheduler = Arc::new(ManualScheduler::new());
        let piano = stem(&bank, 6.0);
        let bass = stem(&bank, 6.0);
        let piano_id = TrackId::from("piano");

        let mut transport = Transport::new(bank.clone(), scheduler.clone(), TransportConfig::default());
        transport.load(
            vec![
                Track::new(piano_id.clone(), TrackRole::Piano, piano, 6.0),
                Track::new(TrackId::from("bass"), TrackRole::parse("bass"), bass, 6.0),
            ],
            None,
        );
        transport.set_mute(&piano_id, true).unwrap();
        transport.play().unwrap();
        assert!(!bank.is_playing(piano));

        bank.advance_secs(2.0);
        scheduler.tick(Duration::from_millis(50));
        assert!((transport.current_time() - 2.0).abs() < 1e-9);

        // piano joins where bass is, not where it was left
        transport.set_mute(&piano_id, false).unwrap();
        assert!(bank.is_playing(piano));
        let drift = bank.current_time(piano).unwrap() - bank.current_time(bass).unwrap();
        assert!(drift.abs() < 1e-9);

        bank.advance_secs(1.0);
        transport.pause().unwrap();
        assert!((transport.current_time() - 3.0).abs() < 1e-9);

        transport.play().unwrap();
        bank.advance_secs(3.0);
        assert!(transport.is_finished());
    }

    #[test]
    fn test_all_muted_then_unmuted_starts_clock() {
        let bank = Arc::new(StemBank::new(RATE));
        let scheduler = Arc::new(ManualScheduler::new());
        let piano = stem(&bank, 4.0);
        let piano_id = TrackId::from("piano");

        let mut transport = Transport::new(bank.clone(), scheduler.clone(), TransportConfig::default());
        transport.load(vec![Track::new(piano_id.clone(), TrackRole::Piano, piano, 4.0)], None);
        transport.set_mute(&piano_id, true).unwrap();
        transport.play().unwrap();
        assert_eq!(scheduler.active_tasks(), 1);

        transport.set_mute(&piano_id, false).unwrap();
        bank.advance_secs(0.5);
        scheduler.tick(Duration::from_millis(50));
        assert!((transport.current_time() - 0.5).abs() < 1e-9);
        assert_eq!(scheduler.active_tasks(), 1);
    }
}
