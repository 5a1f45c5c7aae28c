//! Terminal I/O layer: raw mode, Kitty Graphics Protocol, overlay text,
//! status bar.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use crossterm::{
    ExecutableCommand, QueueableCommand, cursor, event,
    style::{self, Stylize},
    terminal,
};
use std::io::{self, Write, stdout};

use super::state::Layout;
use crate::scene::Scene;

const CHUNK_SIZE: usize = 4096;
const CANVAS_IMAGE_ID: u32 = 1;

// ---------------------------------------------------------------------------
// RawGuard: restores raw mode / alternate screen / mouse / images on Drop
// ---------------------------------------------------------------------------

pub(super) struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub(super) fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = stdout();
        out.execute(terminal::EnterAlternateScreen)?;
        out.execute(event::EnableMouseCapture)?;
        out.execute(cursor::Hide)?;
        Ok(Self { cleaned: false })
    }

    pub(super) fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let mut out = stdout();
        let _ = write!(out, "\x1b_Ga=d,d=A,q=2\x1b\\");
        let _ = out.execute(event::DisableMouseCapture);
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Kitty protocol helpers
// ---------------------------------------------------------------------------

/// Transmit and place the canvas PNG at the top-left, scaled to the canvas
/// area. Re-using one image id replaces the previous frame in place.
pub(super) fn present_canvas(png_data: &[u8], layout: &Layout) -> io::Result<()> {
    let encoded = BASE64.encode(png_data);
    let chunks: Vec<&[u8]> = encoded.as_bytes().chunks(CHUNK_SIZE).collect();
    let (cols, rows) = (layout.cols, layout.image_rows);

    let mut out = stdout();
    out.queue(cursor::MoveTo(0, 0))?;
    for (i, chunk) in chunks.iter().enumerate() {
        let m = if i + 1 == chunks.len() { 0 } else { 1 };
        if i == 0 {
            write!(
                out,
                "\x1b_Ga=T,f=100,i={CANVAS_IMAGE_ID},p=1,c={cols},r={rows},C=1,q=2,m={m};"
            )?;
        } else {
            write!(out, "\x1b_Gm={m},q=2;")?;
        }
        out.write_all(chunk)?;
        write!(out, "\x1b\\")?;
    }
    out.flush()
}

/// Delete all images and their data.
pub(super) fn delete_all_images() -> io::Result<()> {
    let mut out = stdout();
    write!(out, "\x1b_Ga=d,d=A,q=2\x1b\\")?;
    out.flush()
}

pub(super) fn clear_screen() -> io::Result<()> {
    let mut out = stdout();
    out.queue(terminal::Clear(terminal::ClearType::All))?;
    out.flush()
}

// ---------------------------------------------------------------------------
// Text rows
// ---------------------------------------------------------------------------

/// Truncate to `width` characters and pad with spaces.
fn fit(text: &str, width: usize) -> String {
    let truncated: String = text.chars().take(width).collect();
    format!("{truncated:<width$}")
}

/// Overlay lines for a scene: title, subtitle, description, then the
/// micro caption or call-to-action.
fn overlay_lines(scene: Option<&Scene>) -> Vec<String> {
    let Some(scene) = scene else {
        return Vec::new();
    };
    let mut lines = vec![
        format!("{} · {}", scene.title, scene.subtitle),
        scene.description.clone(),
    ];
    if let Some(micro) = &scene.micro {
        lines.push(micro.clone());
    }
    if let Some(cta) = &scene.cta {
        lines.push(format!("[ {cta} ]"));
    }
    lines
}

/// Redraw the overlay rows for `scene` (blank when between scenes).
pub(super) fn draw_scene_overlay(layout: &Layout, scene: Option<&Scene>) -> io::Result<()> {
    let width = layout.cols as usize;
    let lines = overlay_lines(scene);
    let mut out = stdout();
    for row in 0..layout.overlay_rows {
        out.queue(cursor::MoveTo(0, layout.overlay_row + row))?;
        let text = fit(lines.get(row as usize).map_or("", String::as_str), width);
        if row == 0 {
            write!(out, "{}", text.bold())?;
        } else {
            write!(out, "{text}")?;
        }
    }
    out.queue(style::ResetColor)?;
    out.flush()
}

/// Values shown in the status bar.
pub(super) struct Status {
    pub frame: u32,
    pub total: u32,
    pub progress: f64,
    pub cached: usize,
    pub in_flight: usize,
    pub loading: Option<char>,
    pub hint: bool,
    pub count: Option<u32>,
}

pub(super) fn status_text(s: &Status) -> String {
    let mut text = format!(
        " frame {}/{}  {:>3.0}%  cache {} (+{})",
        s.frame,
        s.total,
        s.progress * 100.0,
        s.cached,
        s.in_flight
    );
    if let Some(spin) = s.loading {
        text.push_str(&format!("  {spin} loading"));
    } else if s.hint {
        text.push_str("  scroll ↓");
    }
    match s.count {
        Some(n) => text.push_str(&format!("  :{n}_")),
        None => text.push_str("  [j/k d/u g Ng G/s:skip q:quit]"),
    }
    text
}

/// Draw the status bar on the last terminal row.
pub(super) fn draw_status_bar(layout: &Layout, text: &str) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;
    let padded = fit(text, layout.cols as usize);
    write!(out, "{}", padded.on_dark_grey().white())?;
    out.queue(style::ResetColor)?;
    out.flush()
}

pub(super) fn check_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;
    // Only stdout matters. crossterm's `use-dev-tty` reads keyboard from /dev/tty.
    if !io::stdout().is_terminal() {
        anyhow::bail!(
            "framescroll viewer requires an interactive terminal.\n\
             \n\
             Supported terminals: Kitty, Ghostty, WezTerm\n\
             To render a frame to a file, use: framescroll render --progress 0.5 -o frame.png"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::default_scenes;

    #[test]
    fn fit_truncates_and_pads() {
        assert_eq!(fit("abcdef", 3), "abc");
        assert_eq!(fit("ab", 4), "ab  ");
        assert_eq!(fit("äöü", 2), "äö");
    }

    #[test]
    fn overlay_lines_include_cta_only_when_present() {
        let scenes = default_scenes();
        let first = overlay_lines(scenes.first());
        assert_eq!(first.len(), 3);
        assert!(first[0].starts_with("Dormant Rubab"));

        let research = scenes.iter().find(|s| s.has_cta());
        let lines = overlay_lines(research);
        assert_eq!(lines.last().map(String::as_str), Some("[ Explore Research ]"));

        assert!(overlay_lines(None).is_empty());
    }

    #[test]
    fn status_shows_loading_before_hint() {
        let mut s = Status {
            frame: 1,
            total: 192,
            progress: 0.0,
            cached: 3,
            in_flight: 12,
            loading: Some('|'),
            hint: true,
            count: None,
        };
        let text = status_text(&s);
        assert!(text.contains("frame 1/192"));
        assert!(text.contains("loading"));
        assert!(!text.contains("scroll"));

        s.loading = None;
        s.count = Some(42);
        let text = status_text(&s);
        assert!(text.contains("scroll ↓"));
        assert!(text.contains(":42_"));
    }
}
