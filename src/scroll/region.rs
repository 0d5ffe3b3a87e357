use crate::foundation::core::ScrollProgress;

/// The tall scroll region the cinematic sequence is pinned inside.
///
/// Its height scales with the viewport (`viewports` x viewport height), so a resize changes the
/// scroll distance the whole sequence spans.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollRegion {
    /// Document offset of the region top, in pixels.
    pub top: f64,
    /// Region height expressed in viewport heights.
    pub viewports: f64,
}

impl ScrollRegion {
    pub fn new(top: f64, viewports: f64) -> Self {
        Self { top, viewports }
    }

    pub fn height_px(&self, viewport_height: f64) -> f64 {
        self.viewports * viewport_height
    }

    /// Scroll distance between "top meets top" and "bottom meets bottom".
    pub fn travel_px(&self, viewport_height: f64) -> f64 {
        (self.height_px(viewport_height) - viewport_height).max(0.0)
    }
}

/// Map a document scroll offset to region progress.
///
/// 0 when the region top reaches the viewport top, 1 when the region bottom reaches the viewport
/// bottom, clamped outside.
pub fn progress_for(region: &ScrollRegion, viewport_height: f64, scroll_y: f64) -> ScrollProgress {
    let travel = region.travel_px(viewport_height);
    if travel <= 0.0 {
        return if scroll_y >= region.top {
            ScrollProgress::END
        } else {
            ScrollProgress::START
        };
    }
    ScrollProgress::new((scroll_y - region.top) / travel)
}

/// Single authoritative scroll measurement.
///
/// Scroll and resize events update the tracker; the resulting progress is computed once per event
/// and fanned out to consumers through a [`ProgressSignal`](crate::ProgressSignal).
#[derive(Clone, Debug)]
pub struct ScrollTracker {
    region: ScrollRegion,
    viewport_height: f64,
    scroll_y: f64,
}

impl ScrollTracker {
    pub fn new(region: ScrollRegion, viewport_height: f64) -> Self {
        Self {
            region,
            viewport_height,
            scroll_y: 0.0,
        }
    }

    pub fn region(&self) -> ScrollRegion {
        self.region
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn on_scroll(&mut self, scroll_y: f64) -> ScrollProgress {
        self.scroll_y = scroll_y;
        self.progress()
    }

    pub fn on_resize(&mut self, viewport_height: f64) -> ScrollProgress {
        self.viewport_height = viewport_height;
        self.progress()
    }

    pub fn progress(&self) -> ScrollProgress {
        progress_for(&self.region, self.viewport_height, self.scroll_y)
    }

    /// Document scroll offset that lands exactly on `progress`.
    pub fn scroll_y_for(&self, progress: ScrollProgress) -> f64 {
        self.region.top + progress.get() * self.region.travel_px(self.viewport_height)
    }

    /// Jump to `progress`. The returned progress is `progress` itself, not re-derived from the
    /// pixel offset, so frame selection at rounding boundaries matches [`frame_index_for`].
    /// A region with no travel still reports start or end.
    ///
    /// [`frame_index_for`]: crate::frame_index_for
    pub fn seek(&mut self, progress: ScrollProgress) -> ScrollProgress {
        self.scroll_y = self.scroll_y_for(progress);
        if self.region.travel_px(self.viewport_height) <= 0.0 {
            return self.progress();
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_spans_region_travel() {
        // 400vh region in a 1000px viewport: 3000px of travel.
        let region = ScrollRegion::new(0.0, 4.0);
        assert_eq!(progress_for(&region, 1000.0, 0.0).get(), 0.0);
        assert_eq!(progress_for(&region, 1000.0, 1500.0).get(), 0.5);
        assert_eq!(progress_for(&region, 1000.0, 3000.0).get(), 1.0);
        assert_eq!(progress_for(&region, 1000.0, 9000.0).get(), 1.0);
        assert_eq!(progress_for(&region, 1000.0, -10.0).get(), 0.0);
    }

    #[test]
    fn region_offset_is_respected() {
        let region = ScrollRegion::new(200.0, 2.0);
        assert_eq!(progress_for(&region, 500.0, 200.0).get(), 0.0);
        assert_eq!(progress_for(&region, 500.0, 450.0).get(), 0.5);
    }

    #[test]
    fn degenerate_region_snaps_to_ends() {
        let region = ScrollRegion::new(100.0, 1.0);
        assert_eq!(progress_for(&region, 800.0, 99.0).get(), 0.0);
        assert_eq!(progress_for(&region, 800.0, 100.0).get(), 1.0);
    }

    #[test]
    fn resize_recomputes_from_same_scroll_offset() {
        let mut tracker = ScrollTracker::new(ScrollRegion::new(0.0, 4.0), 1000.0);
        assert_eq!(tracker.on_scroll(1500.0).get(), 0.5);
        // Taller viewport: region grows to 8000px, travel 6000px.
        assert_eq!(tracker.on_resize(2000.0).get(), 0.25);
    }

    #[test]
    fn scroll_y_for_inverts_progress() {
        let tracker = ScrollTracker::new(ScrollRegion::new(50.0, 4.0), 600.0);
        let p = ScrollProgress::new(0.3);
        let y = tracker.scroll_y_for(p);
        assert!((progress_for(&tracker.region(), 600.0, y).get() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn seek_reports_the_requested_progress_exactly() {
        let mut tracker = ScrollTracker::new(ScrollRegion::new(50.3, 4.0), 613.0);
        for i in 0..=1000 {
            let p = ScrollProgress::new(f64::from(i) / 1000.0);
            assert_eq!(tracker.seek(p), p);
            assert!((tracker.progress().get() - p.get()).abs() < 1e-9);
        }
    }

    #[test]
    fn seek_without_travel_pins_to_an_end() {
        let mut tracker = ScrollTracker::new(ScrollRegion::new(0.0, 1.0), 600.0);
        assert_eq!(tracker.seek(ScrollProgress::new(0.4)), ScrollProgress::END);
    }
}
