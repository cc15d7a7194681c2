// Measure mapper - Beat timestamps → measure/beat grid
//
// Walks the beats in order, counting beats against the signature that
// governs the current measure. A change announced for measure m takes
// effect at beat 1 of measure m, so measures can vary in length.

use crate::sequencer::beat_grid::{BeatEvent, BeatGrid};
use crate::sequencer::timeline::TimeSignatureMap;

#[derive(Debug, Clone, Default)]
pub struct MeasureMapper {
    signatures: TimeSignatureMap,
}

impl MeasureMapper {
    pub fn new(signatures: TimeSignatureMap) -> Self {
        Self { signatures }
    }

    pub fn signatures(&self) -> &TimeSignatureMap {
        &self.signatures
    }

    /// Annotate `beats` (seconds) with measure and beat numbers.
    ///
    /// Non-finite timestamps and timestamps not after their predecessor are
    /// skipped with a warning, so the grid stays strictly increasing.
    pub fn map(&self, beats: &[f64]) -> BeatGrid {
        let mut events: Vec<BeatEvent> = Vec::with_capacity(beats.len());
        let mut measure = 1u32;
        let mut beat = 1u32;
        let mut beats_in_measure = self.signatures.signature_at(measure).beats_per_measure();

        for &time in beats {
            if !time.is_finite() || events.last().is_some_and(|prev| time <= prev.time) {
                log::warn!("Skipping out-of-order beat timestamp {}", time);
                continue;
            }

            if beat > beats_in_measure {
                measure += 1;
                beat = 1;
                beats_in_measure = self.signatures.signature_at(measure).beats_per_measure();
            }

            if let Some(prev) = events.last_mut() {
                prev.next_time = Some(time);
            }
            events.push(BeatEvent {
                index: events.len(),
                time,
                measure,
                beat,
                beats_in_measure,
                next_time: None,
            });
            beat += 1;
        }

        log::debug!(
            "Mapped {} beats onto {} measures",
            events.len(),
            events.last().map(|e| e.measure).unwrap_or(0)
        );
        BeatGrid::new(events)
    }
}
