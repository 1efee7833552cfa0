//! Screen-backed frame sampler.
//! Uses `xcap` for cross-platform screenshots of the primary display.
//! Delivers the full frame only; cropping to the board region stays in the
//! detection loop. Latency: 30-50ms typical.
//! Permissions note: on macOS, grant "Screen & System Audio Recording"
//! permission to the terminal in System Settings > Privacy & Security.

use std::time::Instant;

use image::RgbaImage;
use tracing::debug;
use xcap::Monitor;

use crate::detector::FrameSampler;
use crate::error::DetectError;

/// Samples the primary monitor once per tick.
///
/// Monitors are re-enumerated on every sample, so a display being unplugged
/// or reconfigured between ticks surfaces as a recoverable
/// [`DetectError::CaptureUnavailable`] instead of a stale handle.
#[derive(Debug, Default)]
pub struct ScreenSampler;

impl ScreenSampler {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSampler for ScreenSampler {
    fn sample(&mut self) -> Result<RgbaImage, DetectError> {
        let start = Instant::now();

        let monitors = Monitor::all().map_err(|e| {
            DetectError::CaptureUnavailable(format!("failed to enumerate monitors: {e}"))
        })?;

        let monitor = monitors
            .into_iter()
            .next()
            .ok_or_else(|| DetectError::CaptureUnavailable("no monitors found".into()))?;

        let frame = monitor.capture_image().map_err(|e| {
            DetectError::CaptureUnavailable(format!("failed to capture screen: {e}"))
        })?;

        if frame.dimensions() == (0, 0) {
            return Err(DetectError::CaptureUnavailable(
                "captured empty frame - possible permission issue or no display".into(),
            ));
        }

        debug!(latency_ms = start.elapsed().as_millis() as u64, "screen capture complete");
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires graphical display and screen recording permissions"]
    fn test_sample_returns_nonempty_frame() {
        let mut sampler = ScreenSampler::new();
        let frame = sampler.sample().expect("sample failed");
        let (w, h) = frame.dimensions();
        assert!(w > 0 && h > 0, "captured frame has invalid dimensions {}x{}", w, h);
    }
}
