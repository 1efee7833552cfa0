//! Tick-level failure taxonomy.
//! Every variant is recovered locally by the detection loop: the tick is
//! skipped and logged, the previous snapshot stays untouched, the timer
//! keeps running. Ambiguous change sets are not errors at all - they are a
//! normal "no move" outcome.

use thiserror::Error;

use crate::board::BoardRect;

#[derive(Debug, Error)]
pub enum DetectError {
    /// The configured board rectangle does not fit inside the captured frame.
    #[error("board region {rect} exceeds frame bounds {frame_width}x{frame_height}")]
    RegionOutOfBounds {
        rect: BoardRect,
        frame_width: u32,
        frame_height: u32,
    },

    /// The frame sampler could not deliver a frame this tick.
    #[error("screen capture unavailable: {0}")]
    CaptureUnavailable(String),
}
