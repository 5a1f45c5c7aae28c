//! Mounted frame player.
//!
//! Owns one `SequenceState` and lends it to the scheduler, the interpolation
//! loop and the renderer. Everything here runs on the thread that owns the
//! player; only frame fetches happen elsewhere (see `loader`).
//!
//! Scroll updates overwrite the target immediately (last write wins). A
//! fetch issued for an earlier position may still land afterwards; since
//! frames are keyed by index that only fills the cache with a frame that is
//! no longer needed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};

use crate::animation::{InterpolationLoop, LoopPhase, SequenceState};
use crate::canvas::{Canvas, CanvasRenderer, RenderOutcome, Viewport};
use crate::config::Config;
use crate::loader::{FrameLoader, LoadOutcome, LoadRequest};
use crate::scene::{Scene, SceneActivator, SceneChange};
use crate::scheduler::{IdleStrategy, PreloadScheduler};
use crate::scroll::{self, HINT_THRESHOLD, ScrollRegion};
use crate::sequence::FrameIndex;
use crate::source::FrameSource;

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Set when the renderer was invoked this tick.
    pub rendered: Option<RenderOutcome>,
    pub scene_change: Option<SceneChange>,
    /// The initial batch settled during this tick.
    pub loading_finished: bool,
    pub loaded: usize,
    pub failed: usize,
}

pub struct Player {
    total_frames: u32,
    retries: u32,
    region_screens: f64,
    state: SequenceState,
    loader: FrameLoader,
    scheduler: PreloadScheduler,
    region: ScrollRegion,
    interpolation: InterpolationLoop,
    renderer: CanvasRenderer,
    canvas: Canvas,
    scenes: SceneActivator,
    /// Initial-batch frames not yet settled.
    initial: HashSet<FrameIndex>,
    loading: bool,
    torn_down: bool,
}

impl Player {
    /// Mount the player: start the loader and dispatch the initial batch
    /// `1..=initial_batch`. Rendering waits until that batch has settled.
    pub fn mount(config: &Config, source: Arc<dyn FrameSource>, viewport: Viewport) -> Result<Self> {
        let total_frames = config.frames.total;
        let region_screens = config.viewer.region_screens;
        let loader = FrameLoader::spawn(source, config.cache.loader_threads)?;

        let mut player = Self {
            total_frames,
            retries: config.cache.retries,
            region_screens,
            state: SequenceState::default(),
            loader,
            scheduler: PreloadScheduler::new(
                total_frames,
                config.cache.batch_size,
                config.cache.max_size,
                config.cache.retries,
                config.cache.idle_strategy,
            ),
            region: ScrollRegion::new(viewport.height * region_screens, viewport.height),
            interpolation: InterpolationLoop::new(config.animation.damping, config.animation.epsilon),
            renderer: CanvasRenderer::new(
                config.render.background,
                config.render.bias,
                config.render.bias_min_width,
            ),
            canvas: Canvas::new(viewport),
            scenes: SceneActivator::new(config.scenes.clone()),
            initial: HashSet::new(),
            loading: true,
            torn_down: false,
        };
        player.scenes.update(player.state.animation.current);

        let batch = config.cache.initial_batch.min(total_frames);
        for i in 1..=batch {
            match player.loader.load(&mut player.state.cache, i, player.retries) {
                LoadRequest::Dispatched | LoadRequest::AlreadyInFlight => {
                    player.initial.insert(i);
                }
                LoadRequest::Ready(_) | LoadRequest::Closed => {}
            }
        }
        info!(
            "player: mounted ({} frames, initial batch {}, viewport {:.0}x{:.0} @{}x)",
            total_frames, batch, viewport.width, viewport.height, viewport.device_pixel_ratio
        );
        if player.initial.is_empty() {
            player.finish_loading();
        }
        Ok(player)
    }

    // -----------------------------------------------------------------------
    // Scroll / resize input
    // -----------------------------------------------------------------------

    /// Set the scroll offset (logical pixels into the tracked region).
    pub fn on_scroll(&mut self, offset: f64) {
        self.region.set_offset(offset);
        self.retarget();
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.region.scroll_by(delta);
        self.retarget();
    }

    /// Jump to the end of the tracked region.
    pub fn skip_to_end(&mut self) {
        self.region.jump_to_end();
        self.retarget();
    }

    /// Scroll so that the target lands on frame `frame`.
    pub fn go_to_frame(&mut self, frame: FrameIndex) {
        let offset = self.region.offset_for_frame(frame, self.total_frames);
        self.region.set_offset(offset);
        self.retarget();
    }

    /// Scroll to a fraction of the tracked region.
    pub fn seek_progress(&mut self, progress: f64) {
        let offset = progress.clamp(0.0, 1.0) * self.region.max_offset();
        self.region.set_offset(offset);
        self.retarget();
    }

    /// New viewport: resize the backing store and the region, recompute the
    /// target and redraw the current frame.
    pub fn on_resize(&mut self, viewport: Viewport) -> Option<RenderOutcome> {
        debug!(
            "player: resize to {:.0}x{:.0} @{}x",
            viewport.width, viewport.height, viewport.device_pixel_ratio
        );
        self.canvas.resize(viewport);
        self.region
            .resize(viewport.height * self.region_screens, viewport.height);
        self.retarget();
        if self.loading || self.torn_down {
            return None;
        }
        Some(self.render(self.state.animation.current.round()))
    }

    fn retarget(&mut self) {
        if self.torn_down {
            return;
        }
        let target = scroll::target_frame(self.region.progress(), self.total_frames);
        self.state.animation.target = target;
        let center = target.round() as FrameIndex;
        self.scheduler
            .preload(center, &mut self.state.cache, &self.loader);
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    /// One animation tick: apply finished loads, run deferred preloads,
    /// advance the interpolation and draw, then re-resolve the scene.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.torn_down {
            return report;
        }

        let outcomes = self.loader.drain(&mut self.state.cache);
        self.absorb(&outcomes, &mut report);

        if self.scheduler.strategy() == IdleStrategy::Deferred {
            self.scheduler
                .flush_deferred(&mut self.state.cache, &self.loader);
        }

        if let Some(frame) = self.interpolation.tick(&mut self.state.animation)
            && !self.loading
        {
            report.rendered = Some(self.render(frame as f64));
        }

        report.scene_change = self.scenes.update(self.state.animation.current);
        report
    }

    /// Spend idle time until `deadline` dispatching low-priority preloads.
    pub fn run_idle(&mut self, deadline: Instant) -> usize {
        if self.torn_down || self.scheduler.strategy() != IdleStrategy::Idle {
            return 0;
        }
        self.scheduler
            .run_idle(deadline, &mut self.state.cache, &self.loader)
    }

    fn absorb(&mut self, outcomes: &[LoadOutcome], report: &mut TickReport) {
        for outcome in outcomes {
            self.initial.remove(&outcome.index());
            match outcome {
                LoadOutcome::Loaded(_) => report.loaded += 1,
                LoadOutcome::Failed(_) => report.failed += 1,
            }
        }
        if self.loading && self.initial.is_empty() {
            report.loading_finished = true;
            report.rendered = self.finish_loading();
        }
    }

    fn finish_loading(&mut self) -> Option<RenderOutcome> {
        self.loading = false;
        info!(
            "player: initial batch settled ({} cached)",
            self.state.cache.len()
        );
        Some(self.render(self.state.animation.current.round()))
    }

    fn render(&mut self, frame: f64) -> RenderOutcome {
        let outcome = self.renderer.render(
            &mut self.canvas,
            &self.state.cache,
            &mut self.state.animation,
            frame,
        );
        if outcome == RenderOutcome::NoTarget {
            debug!("player: no render target for frame {frame}");
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Blocking helpers (headless rendering, tests)
    // -----------------------------------------------------------------------

    /// Block until the initial batch has settled or `timeout` elapses.
    pub fn wait_until_loaded(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.loading {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            let Some(outcome) = self.loader.wait(&mut self.state.cache, remaining) else {
                return false;
            };
            self.absorb(&[outcome], &mut TickReport::default());
        }
        true
    }

    /// Block until frame `index` is cached. Returns false if it failed to
    /// load or `timeout` elapsed first.
    pub fn wait_for_frame(&mut self, index: FrameIndex, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if let LoadRequest::Closed = self.loader.load(&mut self.state.cache, index, self.retries) {
            return self.state.cache.contains(index);
        }
        loop {
            if self.state.cache.contains(index) {
                return true;
            }
            if !self.state.cache.is_in_flight(index) {
                warn!("player: frame {index} could not be loaded");
                return false;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            let Some(outcome) = self.loader.wait(&mut self.state.cache, remaining) else {
                return false;
            };
            self.absorb(&[outcome], &mut TickReport::default());
        }
    }

    /// Skip the smoothing: put the current position on the target.
    pub fn snap_to_target(&mut self) {
        self.state.animation.snap_to_target();
    }

    /// Draw the current frame now and re-resolve the scene.
    pub fn render_current(&mut self) -> RenderOutcome {
        let outcome = self.render(self.state.animation.current.round());
        self.scenes.update(self.state.animation.current);
        outcome
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Stop the loop and the loader. Idempotent. Fetches already running are
    /// left to finish; their results are discarded.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.interpolation.cancel();
        self.scheduler.clear();
        self.loader.shutdown();
        info!(
            "player: torn down ({} frames still in flight)",
            self.state.cache.in_flight_count()
        );
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// True until the initial batch has settled.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn active_scene_id(&self) -> Option<u32> {
        self.scenes.active_id()
    }

    pub fn active_scene(&self) -> Option<&Scene> {
        self.scenes.active()
    }

    pub fn progress(&self) -> f64 {
        self.region.progress()
    }

    pub fn hint_visible(&self) -> bool {
        self.progress() <= HINT_THRESHOLD
    }

    pub fn phase(&self) -> LoopPhase {
        self.interpolation.phase()
    }

    pub fn state(&self) -> &SequenceState {
        &self.state
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn region(&self) -> &ScrollRegion {
        &self.region
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn queued_preloads(&self) -> usize {
        self.scheduler.queued()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.teardown();
    }
}
