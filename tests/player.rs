use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use image::{Rgba, RgbaImage};

use framescroll::animation::LoopPhase;
use framescroll::canvas::{RenderOutcome, Viewport};
use framescroll::config::{Config, ConfigFile};
use framescroll::player::Player;
use framescroll::scheduler::IdleStrategy;
use framescroll::sequence::FrameIndex;
use framescroll::source::{FrameResource, FrameSource};

const WAIT: Duration = Duration::from_secs(5);

/// In-memory frames: 64x32, red channel = frame index.
struct MemorySource {
    failing: HashSet<FrameIndex>,
    calls: Mutex<HashMap<FrameIndex, usize>>,
}

impl MemorySource {
    fn new() -> Arc<Self> {
        Self::failing(&[])
    }

    fn failing(indices: &[FrameIndex]) -> Arc<Self> {
        Arc::new(Self {
            failing: indices.iter().copied().collect(),
            calls: Mutex::new(HashMap::new()),
        })
    }

    fn calls(&self, index: FrameIndex) -> usize {
        self.calls.lock().unwrap().get(&index).copied().unwrap_or(0)
    }
}

impl FrameSource for MemorySource {
    fn fetch(&self, index: FrameIndex) -> Result<FrameResource> {
        *self.calls.lock().unwrap().entry(index).or_insert(0) += 1;
        if self.failing.contains(&index) {
            bail!("frame {index} unavailable");
        }
        let color = Rgba([index as u8, 128, 0, 255]);
        Ok(FrameResource::new(RgbaImage::from_pixel(64, 32, color)))
    }
}

fn config() -> Config {
    ConfigFile::default().resolve().expect("defaults should resolve")
}

fn viewport() -> Viewport {
    Viewport {
        width: 200.0,
        height: 100.0,
        device_pixel_ratio: 1.0,
    }
}

fn mounted(config: &Config, source: Arc<MemorySource>) -> Player {
    let mut player = Player::mount(config, source, viewport()).expect("mount should succeed");
    assert!(player.wait_until_loaded(WAIT), "initial batch should settle");
    player
}

fn center_red(player: &Player) -> u8 {
    let px = player.canvas().pixels();
    px.get_pixel(px.width() / 2, px.height() / 2).0[0]
}

#[test]
fn test_mount_loads_initial_batch_then_draws_first_frame() {
    let config = config();
    let source = MemorySource::new();
    let mut player = Player::mount(&config, source.clone(), viewport()).unwrap();
    assert!(player.is_loading());
    assert_eq!(player.active_scene_id(), Some(1));

    assert!(player.wait_until_loaded(WAIT));
    assert!(!player.is_loading());
    for i in 1..=15 {
        assert!(player.state().cache.contains(i), "frame {i} should be cached");
        assert_eq!(source.calls(i), 1);
    }
    assert_eq!(source.calls(16), 0);
    assert_eq!(player.canvas().shown(), Some(1));
    assert_eq!(player.state().animation.last_rendered, Some(1));
    assert_eq!(center_red(&player), 1);
}

#[test]
fn test_tick_interpolates_toward_target() {
    let config = config();
    let mut player = mounted(&config, MemorySource::new());

    player.go_to_frame(100);
    assert!((player.state().animation.target - 100.0).abs() < 1e-9);

    let report = player.tick();
    let current = player.state().animation.current;
    assert!((current - 10.9).abs() < 1e-9, "current = {current}");
    assert_eq!(report.rendered, Some(RenderOutcome::Drawn(11)));
    assert_eq!(player.phase(), LoopPhase::Animating);

    let mut prev = current;
    for _ in 0..10 {
        player.tick();
        let now = player.state().animation.current;
        assert!(now > prev && now < 100.0);
        prev = now;
    }
}

#[test]
fn test_presents_only_on_frame_changes() {
    let config = config();
    let mut player = mounted(&config, MemorySource::new());

    player.go_to_frame(3);
    let mut drawn = Vec::new();
    let mut unchanged = 0;
    for _ in 0..60 {
        match player.tick().rendered {
            Some(RenderOutcome::Drawn(index)) => drawn.push(index),
            Some(RenderOutcome::Unchanged(_)) => unchanged += 1,
            _ => {}
        }
    }
    // Frame 1 was drawn when loading finished.
    assert_eq!(drawn, vec![2, 3]);
    assert!(unchanged > 0);
    assert_eq!(player.canvas().shown(), Some(3));
    assert_eq!(center_red(&player), 3);
}

#[test]
fn test_scroll_to_end_targets_last_frame() {
    let config = config();
    let mut player = mounted(&config, MemorySource::new());

    player.skip_to_end();
    assert_eq!(player.progress(), 1.0);
    assert_eq!(player.state().animation.target, 192.0);

    player.snap_to_target();
    assert!(player.wait_for_frame(192, WAIT));
    assert_eq!(player.render_current(), RenderOutcome::Drawn(192));
    assert_eq!(center_red(&player), 192);
    // 185..=192 is outside every scene
    assert_eq!(player.active_scene_id(), None);
}

#[test]
fn test_scene_change_is_reported_once() {
    let config = config();
    let mut player = mounted(&config, MemorySource::new());

    player.go_to_frame(20);
    player.snap_to_target();
    let change = player.tick().scene_change.expect("scene should change");
    assert_eq!(change.previous, Some(1));
    assert_eq!(change.current, Some(2));
    assert!(player.tick().scene_change.is_none());

    player.go_to_frame(120);
    player.snap_to_target();
    player.tick();
    let scene = player.active_scene().expect("frame 120 is in a scene");
    assert_eq!(scene.id, 5);
    assert!(scene.has_cta());
}

#[test]
fn test_failed_frames_are_not_fatal() {
    let config = config();
    let source = MemorySource::failing(&[3]);
    let mut player = mounted(&config, source.clone());

    // retries = 2 → three attempts, then given up
    assert_eq!(source.calls(3), 3);
    assert!(!player.state().cache.contains(3));
    assert!(!player.state().cache.is_in_flight(3));

    player.go_to_frame(3);
    player.snap_to_target();
    assert!(!player.wait_for_frame(3, WAIT));
    assert_eq!(player.render_current(), RenderOutcome::Skipped);
    assert_eq!(player.canvas().shown(), Some(1));

    player.go_to_frame(4);
    player.snap_to_target();
    assert_eq!(player.render_current(), RenderOutcome::Drawn(4));
}

#[test]
fn test_hint_hides_after_scrolling() {
    let config = config();
    let mut player = mounted(&config, MemorySource::new());
    assert!(player.hint_visible());
    player.seek_progress(0.04);
    assert!(player.hint_visible());
    player.seek_progress(0.1);
    assert!(!player.hint_visible());
}

#[test]
fn test_resize_keeps_progress_and_redraws() {
    let config = config();
    let mut player = mounted(&config, MemorySource::new());
    player.seek_progress(0.5);

    let bigger = Viewport {
        width: 400.0,
        height: 300.0,
        device_pixel_ratio: 2.0,
    };
    let outcome = player.on_resize(bigger);
    assert_eq!(outcome, Some(RenderOutcome::Drawn(1)));
    assert!((player.progress() - 0.5).abs() < 1e-9);
    assert_eq!(player.canvas().pixels().dimensions(), (800, 600));
    assert_eq!(player.region().region_height(), 1500.0);
}

#[test]
fn test_zero_sized_viewport_has_no_render_target() {
    let config = config();
    let empty = Viewport {
        width: 0.0,
        height: 0.0,
        device_pixel_ratio: 1.0,
    };
    let mut player = Player::mount(&config, MemorySource::new(), empty).unwrap();
    assert!(player.wait_until_loaded(WAIT));
    assert!(!player.canvas().is_attached());
    assert_eq!(player.render_current(), RenderOutcome::NoTarget);
    assert_eq!(player.state().animation.last_rendered, None);

    assert_eq!(player.on_resize(viewport()), Some(RenderOutcome::Drawn(1)));
}

#[test]
fn test_deferred_strategy_flushes_on_tick() {
    let mut config = config();
    config.cache.idle_strategy = IdleStrategy::Deferred;
    let mut player = mounted(&config, MemorySource::new());

    player.go_to_frame(100);
    assert!(player.queued_preloads() > 0);
    player.tick();
    assert_eq!(player.queued_preloads(), 0);
    assert_eq!(player.run_idle(Instant::now() + WAIT), 0);
}

#[test]
fn test_idle_strategy_dispatches_queued_frames() {
    let config = config();
    let source = MemorySource::new();
    let mut player = mounted(&config, source.clone());

    player.go_to_frame(100);
    let queued = player.queued_preloads();
    assert!(queued > 0);
    // Ticks alone leave the low-priority queue alone.
    player.tick();
    assert_eq!(player.queued_preloads(), queued);

    // Let the immediate neighbours finish so workers are free.
    for i in 98..=102 {
        assert!(player.wait_for_frame(i, WAIT));
    }
    let dispatched = player.run_idle(Instant::now() + WAIT);
    assert!(dispatched > 0);
    assert!(dispatched <= config.cache.loader_threads);
    assert_eq!(player.queued_preloads(), queued - dispatched);
}

#[test]
fn test_teardown_is_idempotent() {
    let config = config();
    let mut player = mounted(&config, MemorySource::new());
    player.go_to_frame(50);

    player.teardown();
    player.teardown();
    assert!(player.is_torn_down());
    assert_eq!(player.phase(), LoopPhase::Cancelled);
    assert_eq!(player.queued_preloads(), 0);

    let target = player.state().animation.target;
    player.go_to_frame(150);
    assert_eq!(player.state().animation.target, target);
    let report = player.tick();
    assert!(report.rendered.is_none());
    assert!(report.scene_change.is_none());
}
