// View module - Timeline layout and playhead following

pub mod autoscroll;
pub mod projector;

pub use autoscroll::AutoScroll;
pub use projector::{MeasureLayout, TimelineConfig, TimelineProjector, ZOOM_PRESETS};
