//! Board region extraction.
//! Crops the full captured frame to the configured board rectangle,
//! pixel for pixel - no resampling, no scaling. The crop must fit entirely
//! inside the frame or the tick is rejected with `RegionOutOfBounds`.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// The square sub-rectangle of the screen believed to contain the board.
/// Configured once per detection session; never changes mid-comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRect {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl std::fmt::Display for BoardRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x={}, y={}, size={}", self.x, self.y, self.size)
    }
}

/// Crops `frame` to `rect`, returning a `size x size` board image whose
/// pixel `(i, j)` equals the frame's pixel `(rect.x + i, rect.y + j)`.
///
/// Fails with [`DetectError::RegionOutOfBounds`] when the rectangle is empty
/// or reaches past either frame edge. The caller skips the tick on failure;
/// the previous snapshot must stay untouched.
pub fn extract_board(frame: &RgbaImage, rect: BoardRect) -> Result<RgbaImage, DetectError> {
    let (frame_width, frame_height) = frame.dimensions();

    if rect.size == 0
        || rect.x.saturating_add(rect.size) > frame_width
        || rect.y.saturating_add(rect.size) > frame_height
    {
        return Err(DetectError::RegionOutOfBounds {
            rect,
            frame_width,
            frame_height,
        });
    }

    Ok(image::imageops::crop_imm(frame, rect.x, rect.y, rect.size, rect.size).to_image())
}
