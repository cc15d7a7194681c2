// Beat grid - Annotated beats (measure/beat per click onset)
//
// Produced once per song load by the measure mapper; read by the
// transport poll and the timeline projector.

use std::fmt;

/// One detected beat placed on the measure grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    pub index: usize,
    /// Onset time in seconds
    pub time: f64,
    /// Measure number (1-based)
    pub measure: u32,
    /// Beat within the measure (1-based)
    pub beat: u32,
    pub beats_in_measure: u32,
    /// Onset time of the following beat; None for the last one
    pub next_time: Option<f64>,
}

impl BeatEvent {
    /// Fraction of the way from this beat to the next, in [0, 1)
    pub fn progress(&self, time: f64) -> f64 {
        match self.next_time {
            Some(next) if next > self.time => {
                ((time - self.time) / (next - self.time)).clamp(0.0, 1.0 - f64::EPSILON)
            }
            _ => 0.0,
        }
    }
}

/// Live playhead position derived from the grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayheadPosition {
    pub measure: u32,
    pub beat: u32,
    /// Fractional progress toward the next beat, in [0, 1)
    pub sub_beat: f64,
}

impl PlayheadPosition {
    /// Position shown before the first beat, and after stop
    pub const START: PlayheadPosition = PlayheadPosition {
        measure: 1,
        beat: 1,
        sub_beat: 0.0,
    };

    /// Sixteenth-note subdivision of the current beat, 1..=4
    pub fn subdivision(&self) -> u32 {
        ((self.sub_beat * 4.0).floor() as u32 + 1).clamp(1, 4)
    }
}

impl Default for PlayheadPosition {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for PlayheadPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.measure, self.beat, self.subdivision())
    }
}

/// Beat events, strictly increasing in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatGrid {
    events: Vec<BeatEvent>,
}

impl BeatGrid {
    /// Wrap mapped events. Callers guarantee increasing `time`.
    pub fn new(events: Vec<BeatEvent>) -> Self {
        debug_assert!(events.windows(2).all(|w| w[0].time < w[1].time));
        Self { events }
    }

    pub fn events(&self) -> &[BeatEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The beat bracketing `time` (`event.time <= time < next_time`).
    /// None before the first beat.
    pub fn locate(&self, time: f64) -> Option<&BeatEvent> {
        let index = self.events.partition_point(|e| e.time <= time);
        index.checked_sub(1).and_then(|i| self.events.get(i))
    }

    pub fn first_beat_of_measure(&self, measure: u32) -> Option<&BeatEvent> {
        let index = self.events.partition_point(|e| e.measure < measure);
        self.events.get(index).filter(|e| e.measure == measure)
    }

    /// Number of measures covered by the grid
    pub fn measure_count(&self) -> u32 {
        self.events.last().map(|e| e.measure).unwrap_or(0)
    }

    /// Measure/beat/sub-beat at `time`; None before the first beat
    pub fn position_at(&self, time: f64) -> Option<PlayheadPosition> {
        self.locate(time).map(|event| PlayheadPosition {
            measure: event.measure,
            beat: event.beat,
            sub_beat: event.progress(time),
        })
    }

    /// Average interval between the first and last beat, as BPM
    pub fn average_bpm(&self) -> Option<f64> {
        let (first, last) = (self.events.first()?, self.events.last()?);
        let span = last.time - first.time;
        if self.events.len() < 2 || span <= 0.0 {
            return None;
        }
        Some(60.0 * (self.events.len() - 1) as f64 / span)
    }
}
