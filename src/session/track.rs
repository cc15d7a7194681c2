// Track - Identity and role of a loaded stem

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::source::StemHandle;

/// Catalog identifier of a track
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// What a stem carries, parsed from the catalog's `type` tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackRole {
    /// Reference metronome; drives the beat grid
    Click,
    Piano,
    AllVocals,
    /// A single voice part ("tenor_1", "bass", ...)
    Part(String),
}

impl TrackRole {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "click" => TrackRole::Click,
            "piano" => TrackRole::Piano,
            "all_vocals" => TrackRole::AllVocals,
            other => TrackRole::Part(other.to_string()),
        }
    }

    pub fn is_click(&self) -> bool {
        matches!(self, TrackRole::Click)
    }

    /// Catalog tag for this role
    pub fn tag(&self) -> &str {
        match self {
            TrackRole::Click => "click",
            TrackRole::Piano => "piano",
            TrackRole::AllVocals => "all_vocals",
            TrackRole::Part(tag) => tag,
        }
    }

    /// Human-readable label ("tenor_1" → "Tenor 1")
    pub fn display_name(&self) -> String {
        format_track_name(self.tag())
    }
}

/// Title-case a snake_case tag; empty tags read "Untitled Track"
pub fn format_track_name(tag: &str) -> String {
    if tag.trim().is_empty() {
        return "Untitled Track".to_string();
    }
    tag.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// A stem bound to an audio handle. Immutable once the song is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub role: TrackRole,
    pub handle: StemHandle,
    pub duration_secs: f64,
}

impl Track {
    pub fn new(id: TrackId, role: TrackRole, handle: StemHandle, duration_secs: f64) -> Self {
        Self {
            id,
            role,
            handle,
            duration_secs,
        }
    }

    pub fn name(&self) -> String {
        self.role.display_name()
    }
}
