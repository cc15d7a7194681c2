// Mixer - Per-track mute/solo/volume/pan and audibility
//
// A track is audible iff (any track soloed ? soloed : !muted). The mixer
// only owns the data; the transport pushes the resulting gain to the
// audio source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::track::TrackId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MixerError {
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    #[error("Invalid {parameter} value: {value}")]
    InvalidValue { parameter: &'static str, value: f32 },
}

/// Mixer settings for one non-click track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    pub muted: bool,
    pub soloed: bool,
    /// Volume in [0, 1]
    pub volume: f32,
    /// Pan in [-1, 1] (left to right)
    pub pan: f32,
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            muted: false,
            soloed: false,
            volume: 1.0,
            pan: 0.0,
        }
    }
}

/// Effective output parameters for a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain {
    pub gain: f32,
    pub pan: f32,
}

impl Gain {
    pub const SILENT: Gain = Gain { gain: 0.0, pan: 0.0 };
}

#[derive(Debug, Clone, Default)]
pub struct Mixer {
    tracks: BTreeMap<TrackId, TrackState>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a track with default state (replaces any previous state)
    pub fn add_track(&mut self, id: TrackId) {
        self.tracks.insert(id, TrackState::default());
    }

    /// Discard all track state (song unload)
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.tracks.contains_key(id)
    }

    pub fn state(&self, id: &TrackId) -> Option<&TrackState> {
        self.tracks.get(id)
    }

    fn state_mut(&mut self, id: &TrackId) -> Result<&mut TrackState, MixerError> {
        self.tracks
            .get_mut(id)
            .ok_or_else(|| MixerError::UnknownTrack(id.clone()))
    }

    /// Muting a track also clears its own solo flag
    pub fn set_mute(&mut self, id: &TrackId, muted: bool) -> Result<(), MixerError> {
        let state = self.state_mut(id)?;
        state.muted = muted;
        if muted {
            state.soloed = false;
        }
        Ok(())
    }

    /// Soloing never touches other tracks' mute flags
    pub fn set_solo(&mut self, id: &TrackId, soloed: bool) -> Result<(), MixerError> {
        self.state_mut(id)?.soloed = soloed;
        Ok(())
    }

    pub fn toggle_mute(&mut self, id: &TrackId) -> Result<bool, MixerError> {
        let muted = !self.state_mut(id)?.muted;
        self.set_mute(id, muted)?;
        Ok(muted)
    }

    pub fn toggle_solo(&mut self, id: &TrackId) -> Result<bool, MixerError> {
        let soloed = !self.state_mut(id)?.soloed;
        self.set_solo(id, soloed)?;
        Ok(soloed)
    }

    /// Set volume, clamped to [0, 1]
    pub fn set_volume(&mut self, id: &TrackId, volume: f32) -> Result<(), MixerError> {
        if !volume.is_finite() {
            return Err(MixerError::InvalidValue {
                parameter: "volume",
                value: volume,
            });
        }
        self.state_mut(id)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    /// Set pan, clamped to [-1, 1]
    pub fn set_pan(&mut self, id: &TrackId, pan: f32) -> Result<(), MixerError> {
        if !pan.is_finite() {
            return Err(MixerError::InvalidValue {
                parameter: "pan",
                value: pan,
            });
        }
        self.state_mut(id)?.pan = pan.clamp(-1.0, 1.0);
        Ok(())
    }

    pub fn any_soloed(&self) -> bool {
        self.tracks.values().any(|s| s.soloed)
    }

    /// Unknown tracks are never audible
    pub fn is_audible(&self, id: &TrackId) -> bool {
        let any_soloed = self.any_soloed();
        self.tracks
            .get(id)
            .is_some_and(|s| if any_soloed { s.soloed } else { !s.muted })
    }

    /// Gain to apply right now: stored volume if audible, otherwise 0
    pub fn effective_gain(&self, id: &TrackId) -> Option<Gain> {
        let state = self.tracks.get(id)?;
        let gain = if self.is_audible(id) { state.volume } else { 0.0 };
        Some(Gain {
            gain,
            pan: state.pan,
        })
    }

    /// Ids of all currently audible tracks
    pub fn audible_tracks(&self) -> Vec<TrackId> {
        let any_soloed = self.any_soloed();
        self.tracks
            .iter()
            .filter(|(_, s)| if any_soloed { s.soloed } else { !s.muted })
            .map(|(id, _)| id.clone())
            .collect()
    }
}
