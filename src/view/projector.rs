// Timeline projector - Beat grid → variable-width measure layout
//
// Every measure is as wide as its beats: a quarter-note beat is one unit,
// an eighth-note beat half a unit. The unit is chosen so `visible_measures`
// 4/4 measures plus a sliver of the next fit in the container.

use serde::{Deserialize, Serialize};

use crate::sequencer::beat_grid::BeatGrid;
use crate::sequencer::timeline::{TimeSignature, TimeSignatureMap};
use crate::view::autoscroll::AutoScroll;

/// Zoom levels offered to the user, in visible measures
pub const ZOOM_PRESETS: [u32; 4] = [4, 8, 12, 16];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Viewport width in layout units (pixels)
    pub container_width: f64,
    /// Zoom: how many 4/4 measures fit in the viewport
    pub visible_measures: u32,
    /// Fraction of an extra measure shown at the right edge
    pub overscan: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            container_width: 800.0,
            visible_measures: 8,
            overscan: 0.15,
        }
    }
}

/// Layout of one measure
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureLayout {
    pub number: u32,
    /// Offset of the measure's left edge
    pub start: f64,
    pub width: f64,
    pub signature: TimeSignature,
    /// Label the signature on this measure (measure 1 and each change)
    pub show_signature: bool,
    /// Beat line offsets relative to `start`
    pub beat_offsets: Vec<f64>,
}

impl MeasureLayout {
    pub fn end(&self) -> f64 {
        self.start + self.width
    }

    pub fn beat_width(&self) -> f64 {
        self.width / self.signature.beats_per_measure() as f64
    }
}

pub struct TimelineProjector {
    grid: BeatGrid,
    signatures: TimeSignatureMap,
    config: TimelineConfig,
    measures: Vec<MeasureLayout>,
}

impl TimelineProjector {
    pub fn new(grid: BeatGrid, signatures: TimeSignatureMap, config: TimelineConfig) -> Self {
        let mut projector = Self {
            grid,
            signatures,
            config,
            measures: Vec::new(),
        };
        projector.relayout();
        projector
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn measures(&self) -> &[MeasureLayout] {
        &self.measures
    }

    pub fn grid(&self) -> &BeatGrid {
        &self.grid
    }

    /// Width of one quarter-note beat
    pub fn unit_beat_width(&self) -> f64 {
        let visible = self.config.visible_measures.max(1) as f64 + self.config.overscan.max(0.0);
        self.config.container_width / visible / 4.0
    }

    /// Total layout width
    pub fn content_width(&self) -> f64 {
        self.measures.last().map(MeasureLayout::end).unwrap_or(0.0)
    }

    /// Change zoom; the layout is recomputed
    pub fn set_visible_measures(&mut self, visible: u32) {
        self.config.visible_measures = visible.max(1);
        self.relayout();
    }

    pub fn set_container_width(&mut self, width: f64) {
        self.config.container_width = width.max(0.0);
        self.relayout();
    }

    /// Next larger preset (fewer measures visible), if any
    pub fn zoom_in(&mut self) -> bool {
        let current = self.config.visible_measures;
        match ZOOM_PRESETS.iter().rev().find(|&&p| p < current) {
            Some(&preset) => {
                self.set_visible_measures(preset);
                true
            }
            None => false,
        }
    }

    /// Next smaller preset (more measures visible), if any
    pub fn zoom_out(&mut self) -> bool {
        let current = self.config.visible_measures;
        match ZOOM_PRESETS.iter().find(|&&p| p > current) {
            Some(&preset) => {
                self.set_visible_measures(preset);
                true
            }
            None => false,
        }
    }

    fn relayout(&mut self) {
        let unit = self.unit_beat_width();
        let mut start = 0.0;

        self.measures = (1..=self.grid.measure_count())
            .map(|number| {
                let signature = self.signatures.signature_at(number);
                let beats = signature.beats_per_measure();
                let beat_width = unit * signature.beat_duration_multiplier();
                let layout = MeasureLayout {
                    number,
                    start,
                    width: beat_width * beats as f64,
                    signature,
                    show_signature: self.signatures.is_change_at(number),
                    beat_offsets: (0..beats).map(|b| b as f64 * beat_width).collect(),
                };
                start += layout.width;
                layout
            })
            .collect();
    }

    pub fn measure(&self, number: u32) -> Option<&MeasureLayout> {
        number
            .checked_sub(1)
            .and_then(|i| self.measures.get(i as usize))
    }

    /// Measure under layout offset `x`
    pub fn measure_at_offset(&self, x: f64) -> Option<u32> {
        let index = self.measures.partition_point(|m| m.start <= x);
        let measure = self.measures.get(index.checked_sub(1)?)?;
        (x < measure.end()).then_some(measure.number)
    }

    /// Layout offset of transport time `seconds`.
    ///
    /// Interpolates between the bracketing beats and never leaves the
    /// owning measure. Before the first beat the playhead sits at 0; the
    /// last beat extrapolates with the previous interval.
    pub fn position_of(&self, seconds: f64) -> f64 {
        let Some(event) = self.grid.locate(seconds) else {
            return 0.0;
        };
        let Some(measure) = self.measure(event.measure) else {
            return 0.0;
        };

        let beat_index = (event.beat.saturating_sub(1) as usize).min(measure.beat_offsets.len().saturating_sub(1));
        let beat_start = measure.start + measure.beat_offsets.get(beat_index).copied().unwrap_or(0.0);

        let progress = match event.next_time {
            Some(_) => event.progress(seconds),
            None => self.trailing_progress(event.index, seconds),
        };

        (beat_start + progress * measure.beat_width()).clamp(measure.start, measure.end())
    }

    fn trailing_progress(&self, index: usize, seconds: f64) -> f64 {
        let events = self.grid.events();
        let (Some(last), Some(prev)) = (events.get(index), index.checked_sub(1).and_then(|i| events.get(i))) else {
            return 0.0;
        };
        let interval = last.time - prev.time;
        if interval <= 0.0 {
            return 0.0;
        }
        ((seconds - last.time) / interval).clamp(0.0, 1.0)
    }

    /// New scroll offset keeping the playhead for `seconds` in view, or
    /// None if the current scroll is fine
    pub fn scroll_for(&self, seconds: f64, current_scroll: f64, autoscroll: &AutoScroll) -> Option<f64> {
        autoscroll.scroll_for(
            self.position_of(seconds),
            current_scroll,
            self.config.container_width,
            self.content_width(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MeasureMapper;
    use crate::sequencer::timeline::TimeSignatureChange;

    fn projector(beats: usize, changes: Vec<TimeSignatureChange>) -> TimelineProjector {
        let signatures = TimeSignatureMap::new(changes);
        let times: Vec<f64> = (0..beats).map(|i| 1.0 + i as f64 * 0.5).collect();
        let grid = MeasureMapper::new(signatures.clone()).map(&times);
        TimelineProjector::new(grid, signatures, TimelineConfig::default())
    }

    #[test]
    fn test_measure_widths_follow_signature() {
        let p = projector(
            20,
            vec![
                TimeSignatureChange::new(2, TimeSignature::six_eight()),
                TimeSignatureChange::new(3, TimeSignature::three_four()),
            ],
        );
        let unit = 800.0 / 8.15 / 4.0;
        assert!((p.unit_beat_width() - unit).abs() < 1e-9);

        let m = p.measures();
        assert!((m[0].width - 4.0 * unit).abs() < 1e-9);
        assert!((m[1].width - 3.0 * unit).abs() < 1e-9); // 6 eighths
        assert!((m[2].width - 3.0 * unit).abs() < 1e-9);
        assert_eq!(m[1].beat_offsets.len(), 6);

        // contiguous
        for pair in m.windows(2) {
            assert!((pair[0].end() - pair[1].start).abs() < 1e-9);
        }
        assert!(m[0].show_signature && m[1].show_signature && m[2].show_signature);
        assert!(!m[3].show_signature);
    }

    #[test]
    fn test_position_exact_on_beats() {
        let p = projector(16, vec![]);
        for event in p.grid().events() {
            let measure = p.measure(event.measure).unwrap();
            let expected = measure.start + measure.beat_offsets[event.beat as usize - 1];
            assert_eq!(p.position_of(event.time), expected);
        }
    }

    #[test]
    fn test_position_interpolates_within_measure() {
        let p = projector(16, vec![]);
        let unit = p.unit_beat_width();
        // halfway between beat 2 (1.5s) and beat 3 (2.0s) of measure 1
        assert!((p.position_of(1.75) - 1.5 * unit).abs() < 1e-9);
        // before the first beat
        assert_eq!(p.position_of(0.2), 0.0);
    }

    #[test]
    fn test_position_after_last_beat_is_clamped() {
        let p = projector(8, vec![]);
        let end = p.content_width();
        // last beat at 4.5s; far past it stays on the measure's right edge
        assert!((p.position_of(100.0) - end).abs() < 1e-9);
        let unit = p.unit_beat_width();
        assert!((p.position_of(4.75) - (end - 0.5 * unit)).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_relayouts() {
        let mut p = projector(16, vec![]);
        let wide = p.measures()[0].width;
        assert!(p.zoom_in());
        assert_eq!(p.config().visible_measures, 4);
        assert!(p.measures()[0].width > wide);
        assert!(!p.zoom_in());

        p.set_visible_measures(16);
        assert!(!p.zoom_out());
        assert!(p.zoom_in());
        assert_eq!(p.config().visible_measures, 12);
    }

    #[test]
    fn test_container_resize_scales_layout() {
        let mut p = projector(16, vec![]);
        let before = p.measures()[1].start;
        p.set_container_width(p.config().container_width * 2.0);
        assert!((p.measures()[1].start - 2.0 * before).abs() < 1e-9);

        p.set_container_width(-10.0);
        assert_eq!(p.content_width(), 0.0);
    }

    #[test]
    fn test_measure_at_offset() {
        let p = projector(16, vec![]);
        let width = p.measures()[0].width;
        assert_eq!(p.measure_at_offset(0.0), Some(1));
        assert_eq!(p.measure_at_offset(width * 1.5), Some(2));
        assert_eq!(p.measure_at_offset(-1.0), None);
        assert_eq!(p.measure_at_offset(p.content_width() + 1.0), None);
    }

    #[test]
    fn test_empty_grid() {
        let p = TimelineProjector::new(BeatGrid::default(), TimeSignatureMap::default(), TimelineConfig::default());
        assert!(p.measures().is_empty());
        assert_eq!(p.position_of(3.0), 0.0);
        assert_eq!(p.content_width(), 0.0);
    }
}
