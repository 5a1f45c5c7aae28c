//! Screen layout and the mapping from terminal cells to logical pixels.

use crate::canvas::Viewport;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Layout {
    pub cols: u16,
    pub image_rows: u16,   // canvas height in rows
    pub overlay_row: u16,  // first row of the scene overlay
    pub overlay_rows: u16,
    pub status_row: u16,   // = term_rows - 1
    pub cell_w: u16,       // pixels per cell (width)
    pub cell_h: u16,       // pixels per cell (height)
}

/// Split the terminal into canvas, overlay text and status bar.
///
/// The overlay shrinks before the canvas does: at least one canvas row is
/// kept on tiny terminals.
pub(super) fn compute_layout(
    term_cols: u16,
    term_rows: u16,
    pixel_w: u16,
    pixel_h: u16,
    overlay_rows: u16,
) -> Layout {
    let usable = term_rows.saturating_sub(1);
    let overlay_rows = overlay_rows.min(usable.saturating_sub(1));
    let image_rows = usable.saturating_sub(overlay_rows);
    let cell_w = if term_cols > 0 { (pixel_w / term_cols).max(1) } else { 1 };
    let cell_h = if term_rows > 0 { (pixel_h / term_rows).max(1) } else { 1 };
    Layout {
        cols: term_cols,
        image_rows,
        overlay_row: image_rows,
        overlay_rows,
        status_row: usable,
        cell_w,
        cell_h,
    }
}

/// Logical viewport of the canvas area. Physical size is the terminal's
/// pixel area; dividing by `dpr` gives the CSS-like logical size.
pub(super) fn viewport(layout: &Layout, device_pixel_ratio: f64) -> Viewport {
    let px_w = f64::from(layout.cols) * f64::from(layout.cell_w);
    let px_h = f64::from(layout.image_rows) * f64::from(layout.cell_h);
    Viewport {
        width: px_w / device_pixel_ratio,
        height: px_h / device_pixel_ratio,
        device_pixel_ratio,
    }
}

/// Logical pixels covered by `rows` terminal rows.
pub(super) fn rows_to_logical(layout: &Layout, rows: u32, device_pixel_ratio: f64) -> f64 {
    f64::from(rows) * f64::from(layout.cell_h) / device_pixel_ratio
}
