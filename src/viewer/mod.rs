//! Terminal frame-sequence viewer with Kitty Graphics Protocol
//!
//! Layout:
//!   rows 0..image_rows      : canvas image (the composed frame)
//!   rows image_rows..status : scene overlay text
//!   row term_rows-1         : status bar
//!
//! Scrolling moves a virtual offset over a tracked region several screens
//! tall; the player maps it to a target frame and interpolates toward it
//! once per tick. Only ticks that actually draw a new frame transmit an
//! image.
//!
//! Kitty response suppression:
//!   All Kitty Graphics Protocol commands use `q=2` (suppress all responses).
//!   Without this, error responses are delivered as APC sequences that
//!   crossterm misparses as key events.

mod input;
mod state;
mod terminal;

use anyhow::{Result, bail};
use crossterm::{
    event::{self, Event},
    terminal as crossterm_terminal,
};
use log::{debug, info};
use std::time::Instant;

use crate::canvas::RenderOutcome;
use crate::config::Config;
use crate::player::Player;
use crate::source::open_source;

use input::{Action, InputAccumulator, map_key_event, map_mouse_event};
use state::Layout;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Run the terminal viewer until the user quits.
pub fn run(config: Config) -> Result<()> {
    terminal::check_tty()?;

    let winsize = crossterm_terminal::window_size()
        .map_err(|e| anyhow::anyhow!("failed to get terminal size: {e}"))?;
    if winsize.width == 0 || winsize.height == 0 {
        bail!(
            "terminal pixel size {}x{} is zero; Kitty graphics requires non-zero pixel dimensions",
            winsize.width,
            winsize.height
        );
    }
    let dpr = config.render.device_pixel_ratio;
    let layout = state::compute_layout(
        winsize.columns,
        winsize.rows,
        winsize.width,
        winsize.height,
        config.viewer.overlay_rows,
    );

    let source = open_source(&config.frames);
    let mut player = Player::mount(&config, source, state::viewport(&layout, dpr))?;

    let mut guard = terminal::RawGuard::enter()?;
    let result = event_loop(&config, &mut player, layout);
    player.teardown();
    guard.cleanup();
    result
}

fn event_loop(config: &Config, player: &mut Player, mut layout: Layout) -> Result<()> {
    let dpr = config.render.device_pixel_ratio;
    let frame_budget = config.animation.frame_budget;
    let mut acc = InputAccumulator::new();
    let mut ticks: usize = 0;
    let mut last_status = String::new();
    let mut next_tick = Instant::now();

    terminal::draw_scene_overlay(&layout, player.active_scene())?;

    loop {
        let now = Instant::now();
        if now >= next_tick {
            let report = player.tick();
            ticks = ticks.wrapping_add(1);
            if report.failed > 0 {
                debug!("viewer: {} frame load(s) failed this tick", report.failed);
            }
            if let Some(RenderOutcome::Drawn(index)) = report.rendered {
                let png = player.canvas().encode_png()?;
                debug!("viewer: presenting frame {index} ({} bytes)", png.len());
                terminal::present_canvas(&png, &layout)?;
            }
            if let Some(change) = report.scene_change {
                debug!("viewer: scene {:?} → {:?}", change.previous, change.current);
                terminal::draw_scene_overlay(&layout, player.active_scene())?;
            }

            let status = status_line(player, acc.peek(), ticks);
            if status != last_status {
                terminal::draw_status_bar(&layout, &status)?;
                last_status = status;
            }

            next_tick = now + frame_budget;
            player.run_idle(next_tick);
        }

        let timeout = next_tick.saturating_duration_since(Instant::now());
        if !event::poll(timeout)? {
            continue;
        }

        let action = match event::read()? {
            Event::Key(key_event) => {
                let action = map_key_event(key_event, &mut acc);
                if action.is_none() && acc.is_active() {
                    acc.reset();
                }
                action
            }
            Event::Mouse(mouse_event) => map_mouse_event(mouse_event),
            Event::Resize(cols, rows) => {
                layout = relayout(config, player, cols, rows)?;
                last_status.clear();
                None
            }
            _ => None,
        };
        let Some(action) = action else {
            continue;
        };

        let step = state::rows_to_logical(&layout, config.viewer.scroll_step, dpr);
        let half_page = state::rows_to_logical(&layout, (u32::from(layout.image_rows) / 2).max(1), dpr);
        match action {
            Action::Quit => {
                info!("viewer: quit");
                return Ok(());
            }
            Action::ScrollDown(n) => player.scroll_by(f64::from(n) * step),
            Action::ScrollUp(n) => player.scroll_by(-f64::from(n) * step),
            Action::HalfPageDown(n) => player.scroll_by(f64::from(n) * half_page),
            Action::HalfPageUp(n) => player.scroll_by(-f64::from(n) * half_page),
            Action::JumpToTop => player.on_scroll(0.0),
            Action::SkipToEnd => player.skip_to_end(),
            Action::GoToFrame(n) => player.go_to_frame(n),
            Action::CancelInput | Action::Digit => {}
        }
        debug!(
            "viewer: {action:?} → offset {:.1}/{:.1}, target {:.2}",
            player.region().offset(),
            player.region().max_offset(),
            player.state().animation.target
        );
    }
}

/// Re-lay out after a terminal resize and hand the new viewport to the player.
fn relayout(config: &Config, player: &mut Player, cols: u16, rows: u16) -> Result<Layout> {
    let winsize = crossterm_terminal::window_size()?;
    let layout = state::compute_layout(
        cols,
        rows,
        winsize.width,
        winsize.height,
        config.viewer.overlay_rows,
    );
    debug!("viewer: resize to {cols}x{rows} cells ({}x{} px)", winsize.width, winsize.height);

    terminal::delete_all_images()?;
    terminal::clear_screen()?;
    let viewport = state::viewport(&layout, config.render.device_pixel_ratio);
    if let Some(RenderOutcome::Drawn(_)) = player.on_resize(viewport) {
        terminal::present_canvas(&player.canvas().encode_png()?, &layout)?;
    }
    terminal::draw_scene_overlay(&layout, player.active_scene())?;
    Ok(layout)
}

fn status_line(player: &Player, count: Option<u32>, ticks: usize) -> String {
    let state = player.state();
    let loading = player
        .is_loading()
        .then(|| SPINNER[(ticks / 8) % SPINNER.len()]);
    terminal::status_text(&terminal::Status {
        frame: state.animation.display_frame(),
        total: player.total_frames(),
        progress: player.progress(),
        cached: state.cache.len(),
        in_flight: state.cache.in_flight_count(),
        loading,
        hint: player.hint_visible(),
        count,
    })
}
