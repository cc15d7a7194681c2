// Session - Loads a song record into the transport and timeline
//
// Every stem is fetched, decoded and registered with the audio source.
// Stems that fail are skipped and reported; the song plays with whatever
// loaded. The click track, when present, is analyzed into a beat grid.

pub mod fetch;
pub mod song;
pub mod track;

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::analysis::{AnalysisError, BeatDetector, MeasureMapper};
use crate::audio::source::{AudioSource, SourceError, StemHandle};
use crate::config::PlayerConfig;
use crate::messaging::channels::{NotificationProducer, PositionProducer, push_notification};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sequencer::beat_grid::BeatGrid;
use crate::sequencer::scheduler::Scheduler;
use crate::sequencer::timeline::TimeSignatureMap;
use crate::sequencer::transport::Transport;
use crate::view::{AutoScroll, TimelineConfig, TimelineProjector};

pub use fetch::{DirectoryFetcher, FetchError, MemoryFetcher, TrackFetcher};
pub use song::{SongError, SongRecord, TrackRecord};
pub use track::{Track, TrackId, TrackRole};

/// Why a single track could not be loaded
#[derive(Debug, Error)]
pub enum TrackLoadError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("decode failed: {0}")]
    Decode(#[from] SourceError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Song(#[from] SongError),

    #[error("No playable tracks in \"{0}\"")]
    NoPlayableTracks(String),
}

/// Outcome of click-track analysis for the loaded song
#[derive(Debug, Clone, PartialEq)]
pub enum GridStatus {
    Ready { beats: usize, bpm: f64 },
    /// The song has no click track
    NoClickTrack,
    /// Fewer than two beats were found in the click
    InsufficientBeats { found: usize },
    /// The click track exists but could not be loaded or analyzed
    ClickUnavailable,
}

impl GridStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, GridStatus::Ready { .. })
    }
}

#[derive(Debug)]
pub struct TrackFailure {
    pub id: TrackId,
    pub error: TrackLoadError,
}

/// The song currently bound to the session
#[derive(Debug)]
pub struct LoadedSong {
    pub record: SongRecord,
    pub signatures: TimeSignatureMap,
    pub grid_status: GridStatus,
    /// Tracks that were skipped
    pub failures: Vec<TrackFailure>,
}

pub struct Session {
    source: Arc<dyn AudioSource>,
    fetcher: Box<dyn TrackFetcher>,
    detector: BeatDetector,
    transport: Transport,
    timeline: TimelineConfig,
    autoscroll: AutoScroll,
    song: Option<LoadedSong>,
    projector: Option<TimelineProjector>,
    handles: Vec<StemHandle>,
    notification_tx: Option<Arc<Mutex<NotificationProducer>>>,
}

impl Session {
    pub fn new(
        source: Arc<dyn AudioSource>,
        scheduler: Arc<dyn Scheduler>,
        fetcher: Box<dyn TrackFetcher>,
        config: &PlayerConfig,
    ) -> Self {
        Self {
            transport: Transport::new(Arc::clone(&source), scheduler, config.transport.clone()),
            source,
            fetcher,
            detector: BeatDetector::new(config.detector.clone()),
            timeline: config.timeline.clone(),
            autoscroll: config.autoscroll.clone(),
            song: None,
            projector: None,
            handles: Vec::new(),
            notification_tx: None,
        }
    }

    /// Report load failures (and transport warnings) to a UI channel
    pub fn with_notifications(mut self, tx: Arc<Mutex<NotificationProducer>>) -> Self {
        self.transport = self.transport.with_notifications(Arc::clone(&tx));
        self.notification_tx = Some(tx);
        self
    }

    pub fn with_position_updates(mut self, tx: Arc<Mutex<PositionProducer>>) -> Self {
        self.transport = self.transport.with_position_updates(tx);
        self
    }

    pub fn song(&self) -> Option<&LoadedSong> {
        self.song.as_ref()
    }

    pub fn grid_status(&self) -> Option<&GridStatus> {
        self.song.as_ref().map(|s| &s.grid_status)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn projector(&self) -> Option<&TimelineProjector> {
        self.projector.as_ref()
    }

    pub fn projector_mut(&mut self) -> Option<&mut TimelineProjector> {
        self.projector.as_mut()
    }

    /// Replace the loaded song (if any) with `song`.
    ///
    /// Fails only when no track at all could be loaded.
    pub fn load_song(&mut self, song: SongRecord) -> Result<&LoadedSong, SessionError> {
        self.unload();
        log::info!("Loading \"{}\" ({} track(s))", song.title, song.tracks.len());

        let signatures = song.signature_map();
        let mut tracks = Vec::with_capacity(song.tracks.len());
        let mut failures = Vec::new();

        for record in &song.tracks {
            match self.load_track(record) {
                Ok(track) => tracks.push(track),
                Err(error) => {
                    let message = format!("Track \"{}\" ({}) skipped: {}", record.id, record.track_type, error);
                    log::warn!("{}", message);
                    self.notify(Notification::warning(NotificationCategory::Track, message));
                    failures.push(TrackFailure {
                        id: TrackId::new(record.id.clone()),
                        error,
                    });
                }
            }
        }

        if tracks.is_empty() {
            log::error!("No playable tracks in \"{}\"", song.title);
            return Err(SessionError::NoPlayableTracks(song.title));
        }

        self.handles = tracks.iter().map(|t| t.handle).collect();
        let (grid, grid_status) = self.analyze(&song, &tracks, &signatures);

        self.transport.load(tracks, grid.clone());
        self.projector = Some(TimelineProjector::new(
            grid.unwrap_or_default(),
            signatures.clone(),
            self.timeline.clone(),
        ));

        Ok(&*self.song.insert(LoadedSong {
            record: song,
            signatures,
            grid_status,
            failures,
        }))
    }

    /// Stop playback and release every stem
    pub fn unload(&mut self) {
        self.transport.unload();
        for handle in self.handles.drain(..) {
            if let Err(e) = self.source.unload(handle) {
                log::warn!("Failed to release {}: {}", handle, e);
            }
        }
        self.song = None;
        self.projector = None;
    }

    /// The timeline container changed size; kept for later song loads too
    pub fn resize(&mut self, container_width: f64) {
        self.timeline.container_width = container_width.max(0.0);
        if let Some(projector) = &mut self.projector {
            projector.set_container_width(container_width);
        }
    }

    /// Scroll offset that keeps the playhead in view, if it must change
    pub fn follow_playhead(&self, current_scroll: f64) -> Option<f64> {
        self.projector
            .as_ref()?
            .scroll_for(self.transport.current_time(), current_scroll, &self.autoscroll)
    }

    fn load_track(&self, record: &TrackRecord) -> Result<Track, TrackLoadError> {
        let bytes = self.fetcher.fetch(record)?;
        let handle = self.source.load(&bytes, record.extension())?;
        let duration = match self.source.duration(handle) {
            Ok(duration) => duration,
            Err(e) => {
                let _ = self.source.unload(handle);
                return Err(e.into());
            }
        };
        log::debug!("Loaded track {} as {} ({:.2}s)", record.id, handle, duration);
        Ok(Track::new(
            TrackId::new(record.id.clone()),
            TrackRole::parse(&record.track_type),
            handle,
            duration,
        ))
    }

    fn analyze(
        &self,
        song: &SongRecord,
        tracks: &[Track],
        signatures: &TimeSignatureMap,
    ) -> (Option<BeatGrid>, GridStatus) {
        let Some(click) = tracks.iter().find(|t| t.role.is_click()) else {
            return if song.click_track().is_some() {
                (None, GridStatus::ClickUnavailable)
            } else {
                log::info!("\"{}\" has no click track", song.title);
                (None, GridStatus::NoClickTrack)
            };
        };

        let (samples, sample_rate) = match self.source.mono_samples(click.handle) {
            Ok(mono) => mono,
            Err(e) => {
                log::warn!("Click track unavailable for analysis: {}", e);
                return (None, GridStatus::ClickUnavailable);
            }
        };

        match self.detector.detect(&samples, sample_rate) {
            Ok(analysis) => {
                let grid = MeasureMapper::new(signatures.clone()).map(&analysis.beats);
                let status = GridStatus::Ready {
                    beats: analysis.beats.len(),
                    bpm: analysis.bpm,
                };
                (Some(grid), status)
            }
            Err(AnalysisError::InsufficientBeats { found }) => {
                let message = format!("Could not detect beats in the click track (found {})", found);
                log::warn!("{}", message);
                self.notify(Notification::warning(NotificationCategory::Analysis, message));
                (None, GridStatus::InsufficientBeats { found })
            }
            Err(e) => {
                log::warn!("Beat detection failed: {}", e);
                self.notify(Notification::warning(NotificationCategory::Analysis, e.to_string()));
                (None, GridStatus::ClickUnavailable)
            }
        }
    }

    fn notify(&self, notification: Notification) {
        if let Some(tx) = &self.notification_tx {
            push_notification(tx, notification);
        }
    }
}
