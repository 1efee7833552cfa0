//! Per-cell change detection between two board snapshots.
//! Partitions the board into 64 equal cells and compares each cell pixel by
//! pixel. A pixel counts as different when the summed absolute RGB delta
//! exceeds `pixel_delta`; a cell counts as changed when the fraction of
//! different pixels exceeds `changed_fraction`. Cells are reported in
//! row-major order so downstream inference is deterministic.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cells per board edge. Chess says 8; the diff says nothing else.
const GRID_EDGE: u32 = 8;

/// One of the 64 board cells. Row 0 is the visual top, col 0 the visual left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

impl Cell {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

/// Detection thresholds. Policy values, not derived - kept in configuration
/// so boundary behaviour can be probed precisely.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffThresholds {
    /// Summed absolute RGB delta (0-765) above which a pixel is "different".
    pub pixel_delta: u32,
    /// Fraction of different pixels (0.0-1.0) above which a cell is "changed".
    pub changed_fraction: f32,
}

impl Default for DiffThresholds {
    fn default() -> Self {
        Self {
            pixel_delta: 30,
            changed_fraction: 0.15,
        }
    }
}

/// Summed absolute difference of the R, G and B channels. Alpha is ignored;
/// captures are opaque and the board renderer does not blend.
fn pixel_delta(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
    let Rgba([r1, g1, b1, _]) = a;
    let Rgba([r2, g2, b2, _]) = b;
    r1.abs_diff(r2) as u32 + g1.abs_diff(g2) as u32 + b1.abs_diff(b2) as u32
}

/// Whether the `cell_size` square at `(x0, y0)` differs significantly
/// between the two snapshots. Indexing is guarded against both images'
/// true extents; the denominator stays the nominal cell area.
fn cell_changed(
    prev: &RgbaImage,
    curr: &RgbaImage,
    x0: u32,
    y0: u32,
    cell_size: u32,
    thresholds: &DiffThresholds,
) -> bool {
    let mut diff_pixels = 0u32;
    let total_pixels = cell_size * cell_size;

    for dy in 0..cell_size {
        for dx in 0..cell_size {
            let (x, y) = (x0 + dx, y0 + dy);
            if x < prev.width() && y < prev.height() && x < curr.width() && y < curr.height() {
                if pixel_delta(*prev.get_pixel(x, y), *curr.get_pixel(x, y)) > thresholds.pixel_delta
                {
                    diff_pixels += 1;
                }
            }
        }
    }

    diff_pixels as f32 / total_pixels as f32 > thresholds.changed_fraction
}

/// Compares two board snapshots cell by cell and returns every changed cell
/// in row-major order (top-to-bottom, left-to-right).
///
/// Both snapshots are expected to share the same `N x N` dimensions with `N`
/// divisible by 8; the caller establishes this by cropping both from the same
/// `BoardRect`. A mismatch is tolerated by bounds-guarded indexing rather
/// than re-validated here.
pub fn changed_cells(prev: &RgbaImage, curr: &RgbaImage, thresholds: &DiffThresholds) -> Vec<Cell> {
    let cell_size = prev.width() / GRID_EDGE;
    if cell_size == 0 {
        debug!(width = prev.width(), "board snapshot too small to partition");
        return Vec::new();
    }

    let mut changes = Vec::new();
    for row in 0..GRID_EDGE {
        for col in 0..GRID_EDGE {
            let x0 = col * cell_size;
            let y0 = row * cell_size;
            if cell_changed(prev, curr, x0, y0, cell_size, thresholds) {
                changes.push(Cell::new(row as u8, col as u8));
            }
        }
    }

    debug!(changed = changes.len(), cell_size, "board diff complete");
    changes
}
