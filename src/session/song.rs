// Song record - Catalog entry for one song as exported by the catalog app

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sequencer::timeline::{TimeSignature, TimeSignatureChange, TimeSignatureMap};

#[derive(Debug, Error)]
pub enum SongError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Unsupported song file extension: {0}")]
    UnsupportedExtension(String),
}

fn default_signature() -> String {
    "4/4".to_string()
}

/// Signature change as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureChangeRecord {
    pub measure: u32,
    pub time_signature: String,
}

/// One stem file of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub track_type: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl TrackRecord {
    /// File extension of the stem, used as a decoder hint
    pub fn extension(&self) -> Option<&str> {
        let path = self.file_path.as_deref()?;
        Path::new(path).extension().and_then(|e| e.to_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default = "default_signature")]
    pub time_signature: String,
    #[serde(default)]
    pub time_signature_changes: Vec<SignatureChangeRecord>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub voicing: Option<String>,
    #[serde(default)]
    pub composers: Vec<String>,
    #[serde(default)]
    pub lyricists: Vec<String>,
    #[serde(default)]
    pub arrangers: Vec<String>,
}

impl SongRecord {
    pub fn from_json(json: &str) -> Result<Self, SongError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_ron(text: &str) -> Result<Self, SongError> {
        Ok(ron::from_str(text)?)
    }

    /// Load a `.json` or `.ron` song file
    pub fn load(path: &Path) -> Result<Self, SongError> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::from_json(&text),
            Some("ron") => Self::from_ron(&text),
            other => Err(SongError::UnsupportedExtension(other.unwrap_or("").to_string())),
        }
    }

    /// Signature in effect from measure 1; malformed strings read 4/4
    pub fn initial_signature(&self) -> TimeSignature {
        TimeSignature::parse_or_default(&self.time_signature)
    }

    /// Full signature timeline. Changes at measure 0 are dropped.
    pub fn signature_map(&self) -> TimeSignatureMap {
        let changes = self.time_signature_changes.iter().map(|change| {
            TimeSignatureChange::new(change.measure, TimeSignature::parse_or_default(&change.time_signature))
        });
        TimeSignatureMap::with_initial(self.initial_signature(), changes)
    }

    pub fn click_track(&self) -> Option<&TrackRecord> {
        self.tracks
            .iter()
            .find(|t| t.track_type.trim().eq_ignore_ascii_case("click"))
    }

    /// "Composed by A & B", "Lyrics by C", "Arranged by D", skipping
    /// empty lists
    pub fn credits(&self) -> Vec<String> {
        [
            ("Composed by", &self.composers),
            ("Lyrics by", &self.lyricists),
            ("Arranged by", &self.arrangers),
        ]
        .into_iter()
        .filter_map(|(label, names)| join_names(names).map(|names| format!("{} {}", label, names)))
        .collect()
    }
}

fn join_names(names: &[String]) -> Option<String> {
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    match names.as_slice() {
        [] => None,
        [only] => Some(only.to_string()),
        [rest @ .., last] => Some(format!("{} & {}", rest.join(", "), last)),
    }
}
