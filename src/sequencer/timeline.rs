// Timeline - Time signatures, tempo and the signature-change timeline
//
// Songs may change meter mid-piece; the map below answers "which
// signature governs measure N" for both the beat mapper and the layout.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error("Invalid time signature: {0:?} (expected \"<beats>/<unit>\", unit in 1, 2, 4, 8, 16)")]
    InvalidSignature(String),

    #[error("BPM must be between 20 and 999, got {0}")]
    InvalidTempo(f64),
}

/// Time signature (numerator/denominator)
/// Example: 6/8 time = TimeSignature { numerator: 6, denominator: 8 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per measure
    pub denominator: u8, // Beat unit (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a time signature; the beat unit must be 1, 2, 4, 8 or 16
    pub fn new(numerator: u8, denominator: u8) -> Result<Self, TimelineError> {
        if numerator == 0 || !matches!(denominator, 1 | 2 | 4 | 8 | 16) {
            return Err(TimelineError::InvalidSignature(format!(
                "{}/{}",
                numerator, denominator
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Common 4/4 time signature
    pub const fn four_four() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }

    /// Common 3/4 time signature (waltz)
    pub const fn three_four() -> Self {
        Self {
            numerator: 3,
            denominator: 4,
        }
    }

    /// Common 6/8 time signature
    pub const fn six_eight() -> Self {
        Self {
            numerator: 6,
            denominator: 8,
        }
    }

    /// Parse `"<beats>/<unit>"`, falling back to 4/4 with a warning
    pub fn parse_or_default(text: &str) -> Self {
        text.parse().unwrap_or_else(|e: TimelineError| {
            log::warn!("{}; falling back to 4/4", e);
            Self::four_four()
        })
    }

    pub fn beats_per_measure(&self) -> u32 {
        self.numerator as u32
    }

    pub fn beat_unit(&self) -> u32 {
        self.denominator as u32
    }

    /// Beat duration relative to quarter note
    /// Example: 4/4 = 1.0, 6/8 = 0.5 (eighth notes)
    pub fn beat_duration_multiplier(&self) -> f64 {
        4.0 / self.denominator as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TimelineError::InvalidSignature(s.to_string());
        let (beats, unit) = s.trim().split_once('/').ok_or_else(invalid)?;
        let beats: u8 = beats.trim().parse().map_err(|_| invalid())?;
        let unit: u8 = unit.trim().parse().map_err(|_| invalid())?;
        Self::new(beats, unit).map_err(|_| invalid())
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Result<Self, TimelineError> {
        if !(20.0..=999.0).contains(&bpm) {
            return Err(TimelineError::InvalidTempo(bpm));
        }
        Ok(Self { bpm })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// A signature taking effect at beat 1 of `measure` (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignatureChange {
    pub measure: u32,
    pub signature: TimeSignature,
}

impl TimeSignatureChange {
    pub fn new(measure: u32, signature: TimeSignature) -> Self {
        Self { measure, signature }
    }
}

/// Sorted, de-duplicated signature changes; always has an entry at measure 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSignatureMap {
    changes: Vec<TimeSignatureChange>,
}

impl TimeSignatureMap {
    /// Build from unordered changes, with 4/4 implied at measure 1
    pub fn new(changes: impl IntoIterator<Item = TimeSignatureChange>) -> Self {
        Self::with_initial(TimeSignature::four_four(), changes)
    }

    /// Build from unordered changes, with `initial` implied at measure 1.
    ///
    /// Changes at measure 0 are dropped; when two changes share a measure
    /// the later one in input order wins.
    pub fn with_initial(
        initial: TimeSignature,
        changes: impl IntoIterator<Item = TimeSignatureChange>,
    ) -> Self {
        let mut sorted: Vec<TimeSignatureChange> = changes
            .into_iter()
            .filter(|change| {
                if change.measure == 0 {
                    log::warn!("Ignoring time signature change at measure 0");
                }
                change.measure >= 1
            })
            .collect();
        sorted.sort_by_key(|change| change.measure);

        let mut deduped: Vec<TimeSignatureChange> = Vec::with_capacity(sorted.len() + 1);
        for change in sorted {
            match deduped.last_mut() {
                Some(last) if last.measure == change.measure => *last = change,
                _ => deduped.push(change),
            }
        }

        if deduped.first().is_none_or(|first| first.measure != 1) {
            deduped.insert(0, TimeSignatureChange::new(1, initial));
        }

        Self { changes: deduped }
    }

    /// Signature governing `measure`: the last change at or before it
    pub fn signature_at(&self, measure: u32) -> TimeSignature {
        let index = self.changes.partition_point(|c| c.measure <= measure);
        index
            .checked_sub(1)
            .and_then(|i| self.changes.get(i))
            .map(|c| c.signature)
            .unwrap_or_default()
    }

    pub fn changes(&self) -> &[TimeSignatureChange] {
        &self.changes
    }

    /// True when a signature label belongs on `measure` (measure 1 and every change)
    pub fn is_change_at(&self, measure: u32) -> bool {
        self.changes
            .binary_search_by_key(&measure, |c| c.measure)
            .is_ok()
    }
}

impl Default for TimeSignatureMap {
    fn default() -> Self {
        Self::new([])
    }
}
