// Auto-scroll - Keep the playhead inside a comfort zone of the viewport

use serde::{Deserialize, Serialize};

/// Recentres the viewport when the playhead leaves
/// [scroll + margin_start·viewport, scroll + margin_end·viewport]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoScroll {
    pub margin_start: f64,
    pub margin_end: f64,
}

impl Default for AutoScroll {
    fn default() -> Self {
        Self {
            margin_start: 0.3,
            margin_end: 0.7,
        }
    }
}

impl AutoScroll {
    /// New scroll offset, or None when the playhead is inside the margins
    /// (or recentring would not move the view)
    pub fn scroll_for(
        &self,
        playhead: f64,
        current_scroll: f64,
        viewport_width: f64,
        content_width: f64,
    ) -> Option<f64> {
        if viewport_width <= 0.0 {
            return None;
        }

        let low = current_scroll + self.margin_start * viewport_width;
        let high = current_scroll + self.margin_end * viewport_width;
        if (low..=high).contains(&playhead) {
            return None;
        }

        let max_scroll = (content_width - viewport_width).max(0.0);
        let target = (playhead - viewport_width / 2.0).clamp(0.0, max_scroll);
        ((target - current_scroll).abs() > 1e-9).then_some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inside_margins_does_nothing() {
        let scroll = AutoScroll::default();
        assert_eq!(scroll.scroll_for(400.0, 0.0, 800.0, 5000.0), None);
        assert_eq!(scroll.scroll_for(240.0, 0.0, 800.0, 5000.0), None);
        assert_eq!(scroll.scroll_for(560.0, 0.0, 800.0, 5000.0), None);
    }

    #[test]
    fn test_recentres_past_margin() {
        let scroll = AutoScroll::default();
        assert_eq!(scroll.scroll_for(600.0, 0.0, 800.0, 5000.0), Some(200.0));
        // jumped backwards
        assert_eq!(scroll.scroll_for(1000.0, 3000.0, 800.0, 5000.0), Some(600.0));
    }

    #[test]
    fn test_clamped_to_content() {
        let scroll = AutoScroll::default();
        assert_eq!(scroll.scroll_for(4950.0, 3000.0, 800.0, 5000.0), Some(4200.0));
        // near the start the view cannot scroll below 0
        assert_eq!(scroll.scroll_for(100.0, 0.0, 800.0, 5000.0), None);
        assert_eq!(scroll.scroll_for(100.0, 500.0, 800.0, 5000.0), Some(0.0));
        // content narrower than viewport
        assert_eq!(scroll.scroll_for(700.0, 0.0, 800.0, 600.0), None);
    }
}
