// Track fetching - Where stem bytes come from

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::song::TrackRecord;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Track {0} has no file path")]
    MissingPath(String),

    #[error("Track file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the raw bytes of a track's audio file
pub trait TrackFetcher: Send + Sync {
    fn fetch(&self, track: &TrackRecord) -> Result<Vec<u8>, FetchError>;
}

/// Reads `filePath` relative to a base directory
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Catalog paths are written as "/stems/x.mp3"; they are always
    /// resolved under the root
    pub fn resolve(&self, file_path: &str) -> PathBuf {
        self.root.join(file_path.trim_start_matches(['/', '\\']))
    }
}

impl TrackFetcher for DirectoryFetcher {
    fn fetch(&self, track: &TrackRecord) -> Result<Vec<u8>, FetchError> {
        let file_path = track
            .file_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| FetchError::MissingPath(track.id.clone()))?;

        let path = self.resolve(file_path);
        if !path.is_file() {
            return Err(FetchError::NotFound(path.display().to_string()));
        }
        log::debug!("Reading track {} from {}", track.id, path.display());
        Ok(std::fs::read(path)?)
    }
}

/// In-memory track bytes keyed by track id
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, track_id: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(track_id.into(), bytes);
    }

    pub fn with(mut self, track_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(track_id, bytes);
        self
    }
}

impl TrackFetcher for MemoryFetcher {
    fn fetch(&self, track: &TrackRecord) -> Result<Vec<u8>, FetchError> {
        self.files
            .get(&track.id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(track.id.clone()))
    }
}
