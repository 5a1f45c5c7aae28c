//! Scroll geometry → continuous target frame.

use crate::sequence::FrameIndex;

/// Progress at or below which the "scroll to explore" hint stays visible.
pub const HINT_THRESHOLD: f64 = 0.05;

/// Fraction of the tracked region scrolled through, in `[0, 1]`.
///
/// `top` is the region's top edge relative to the viewport (negative once the
/// region has scrolled up). A region no taller than the viewport has nothing
/// to scroll through and always reports 0.
pub fn progress(top: f64, region_height: f64, viewport_height: f64) -> f64 {
    let travel = region_height - viewport_height;
    if travel <= 0.0 || !travel.is_finite() {
        return 0.0;
    }
    (-top / travel).clamp(0.0, 1.0)
}

/// Map progress onto `[1, total_frames]`.
pub fn target_frame(progress: f64, total_frames: u32) -> f64 {
    1.0 + progress * (total_frames.max(1) - 1) as f64
}

/// Virtual scroll position over the tracked region, in logical pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollRegion {
    offset: f64,
    region_height: f64,
    viewport_height: f64,
}

impl ScrollRegion {
    pub fn new(region_height: f64, viewport_height: f64) -> Self {
        Self {
            offset: 0.0,
            region_height,
            viewport_height,
        }
    }

    /// Scroll distance over which the sequence plays.
    pub fn max_offset(&self) -> f64 {
        (self.region_height - self.viewport_height).max(0.0)
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Region top relative to the viewport.
    pub fn top(&self) -> f64 {
        -self.offset
    }

    pub fn region_height(&self) -> f64 {
        self.region_height
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset.clamp(0.0, self.max_offset());
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.set_offset(self.offset + delta);
    }

    /// Jump to the end of the region (the "skip" control).
    pub fn jump_to_end(&mut self) {
        self.offset = self.max_offset();
    }

    /// New geometry; the offset keeps its relative position.
    pub fn resize(&mut self, region_height: f64, viewport_height: f64) {
        let p = self.progress();
        self.region_height = region_height;
        self.viewport_height = viewport_height;
        self.offset = p * self.max_offset();
    }

    pub fn progress(&self) -> f64 {
        progress(self.top(), self.region_height, self.viewport_height)
    }

    /// Offset at which the target frame equals `frame`.
    pub fn offset_for_frame(&self, frame: FrameIndex, total_frames: u32) -> f64 {
        if total_frames <= 1 {
            return 0.0;
        }
        let p = (frame.clamp(1, total_frames) - 1) as f64 / (total_frames - 1) as f64;
        p * self.max_offset()
    }
}
