//! Detection loop: drives the sample-compare-infer cycle on a 1 s timer.
//! Holds the only mutable state in the crate - the previous board snapshot -
//! and replaces it exactly once per successful tick. A failed tick logs,
//! leaves the snapshot alone and waits for the next interval; nothing short
//! of `stop` (or dropping the detector) ends the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::Orientation;
use crate::board::{self, BoardRect};
use crate::config::Config;
use crate::error::DetectError;
use crate::grid::{self, DiffThresholds};
use crate::moves;

/// Fixed delay between the end of one tick and the start of the next.
const DETECTION_INTERVAL: Duration = Duration::from_millis(1000);

/// Supplies one full frame per tick, synchronously.
/// Cropping to the board region is the detector's job, not the sampler's.
pub trait FrameSampler: Send {
    fn sample(&mut self) -> Result<RgbaImage, DetectError>;
}

/// Receives one human-readable line per tick outcome.
/// Presentation is entirely the sink's concern.
pub trait DetectionSink: Send + Sync {
    /// A move was inferred this tick, in UCI square-pair form ("e2e4").
    fn on_move(&self, uci: &str);
    /// Anything else worth telling the user: baseline, no move, errors,
    /// state transitions.
    fn on_log(&self, message: &str);
}

/// Everything a tick touches, behind one lock so at most one comparison is
/// ever in flight.
struct TickState {
    sampler: Box<dyn FrameSampler>,
    previous: Option<RgbaImage>,
}

struct Shared {
    running: AtomicBool,
    flipped: AtomicBool,
    board: BoardRect,
    thresholds: DiffThresholds,
    state: Mutex<TickState>,
    sink: Box<dyn DetectionSink>,
}

/// The detection loop. Idle until [`start`](Detector::start), back to idle on
/// [`stop`](Detector::stop); the previous snapshot survives stop/start so a
/// resumed session diffs against the last known board state.
pub struct Detector {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Detector {
    pub fn new<S, K>(sampler: S, sink: K, config: &Config) -> Self
    where
        S: FrameSampler + 'static,
        K: DetectionSink + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                flipped: AtomicBool::new(config.flipped),
                board: config.board,
                thresholds: config.thresholds,
                state: Mutex::new(TickState {
                    sampler: Box::new(sampler),
                    previous: None,
                }),
                sink: Box::new(sink),
            }),
            worker: None,
        }
    }

    /// Idle -> Running. Spawns the worker thread; a stale previous snapshot
    /// is deliberately kept so the first tick after a restart can still diff
    /// against it. No-op when already running.
    pub fn start(&mut self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            debug!("start ignored, detection already running");
            return;
        }
        self.shared.sink.on_log("Detection started...");

        let shared = Arc::clone(&self.shared);
        self.worker = Some(thread::spawn(move || {
            while shared.running.load(Ordering::SeqCst) {
                run_tick(&shared);
                wait_fixed_delay(&shared);
            }
        }));
    }

    /// Running -> Idle. The in-flight tick, if any, completes; only the next
    /// one is cancelled. The previous snapshot is kept for a later `start`.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                warn!("detection worker panicked");
            }
        }
        self.shared.sink.on_log("Detection stopped");
    }

    /// Toggles board orientation, running or not. Takes effect on the next
    /// inference; the diff itself is orientation-blind.
    pub fn flip(&self) {
        let was_flipped = self.shared.flipped.fetch_xor(true, Ordering::SeqCst);
        let orientation = Orientation::from_flipped(!was_flipped);
        self.shared.sink.on_log(&format!("Board flipped: {orientation}"));
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_flipped(self.shared.flipped.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Runs one sample-compare-infer cycle immediately on the calling thread.
    /// The worker uses the same path; the state lock keeps cycles serialized
    /// however they are driven.
    pub fn tick(&self) {
        run_tick(&self.shared);
    }
}

impl Drop for Detector {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
    }
}

/// One tick: sample, crop, diff against the previous snapshot, infer, emit,
/// replace the snapshot. Any failure before the diff leaves the snapshot
/// untouched and only costs this tick.
fn run_tick(shared: &Shared) {
    let started = Instant::now();

    // Only the worker locks this while running; `tick()` callers serialize
    // through the same mutex.
    let mut state = shared.state.lock().unwrap();

    let frame = match state.sampler.sample() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "tick skipped");
            shared.sink.on_log(&format!("Error: {e}"));
            return;
        }
    };

    let board_image = match board::extract_board(&frame, shared.board) {
        Ok(board_image) => board_image,
        Err(e) => {
            warn!(error = %e, "tick skipped");
            shared.sink.on_log(&format!("Error: {e}"));
            return;
        }
    };
    drop(frame);

    if std::env::var_os("DEBUG_CAPTURE").is_some() {
        save_debug_board(&board_image);
    }

    match state.previous.take() {
        Some(previous) => {
            let changes = grid::changed_cells(&previous, &board_image, &shared.thresholds);
            let orientation = Orientation::from_flipped(shared.flipped.load(Ordering::SeqCst));
            match moves::infer_move(&changes, orientation) {
                Some(uci) => shared.sink.on_move(&uci),
                None => shared.sink.on_log("No move detected"),
            }
        }
        None => shared.sink.on_log("Baseline captured"),
    }

    state.previous = Some(board_image);
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "tick complete");
}

/// Fixed-delay discipline: the interval starts counting only after the tick's
/// side effects are applied, so ticks never overlap no matter how slow the
/// sampler is. `stop` unparks the worker to cut the wait short.
fn wait_fixed_delay(shared: &Shared) {
    let deadline = Instant::now() + DETECTION_INTERVAL;
    loop {
        if !shared.running.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::park_timeout(deadline - now);
    }
}

fn save_debug_board(board_image: &RgbaImage) {
    if let Err(e) = std::fs::create_dir_all("screenshots") {
        debug!(error = %e, "could not create screenshots/ debug directory");
        return;
    }
    if let Err(e) = board_image.save("screenshots/debug_board.png") {
        debug!(error = %e, "could not save debug board image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use image::Rgba;
    use std::collections::VecDeque;

    const CELL: u32 = 8;
    const BOARD: u32 = CELL * 8;

    /// Sampler fed from a fixed script of frames and failures.
    struct ScriptedSampler {
        frames: VecDeque<Result<RgbaImage, DetectError>>,
    }

    impl ScriptedSampler {
        fn new(frames: Vec<Result<RgbaImage, DetectError>>) -> Self {
            Self {
                frames: frames.into(),
            }
        }
    }

    impl FrameSampler for ScriptedSampler {
        fn sample(&mut self) -> Result<RgbaImage, DetectError> {
            self.frames
                .pop_front()
                .unwrap_or_else(|| Err(DetectError::CaptureUnavailable("script exhausted".into())))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        moves: Arc<Mutex<Vec<String>>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSink {
        fn moves(&self) -> Vec<String> {
            self.moves.lock().unwrap().clone()
        }
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl DetectionSink for RecordingSink {
        fn on_move(&self, uci: &str) {
            self.moves.lock().unwrap().push(uci.to_string());
        }
        fn on_log(&self, message: &str) {
            self.log.lock().unwrap().push(message.to_string());
        }
    }

    fn board_frame(shade: u8) -> RgbaImage {
        RgbaImage::from_pixel(BOARD, BOARD, Rgba([shade, shade, shade, 255]))
    }

    fn with_repainted(base: &RgbaImage, cells: &[Cell], shade: u8) -> RgbaImage {
        let mut out = base.clone();
        for cell in cells {
            let x0 = cell.col as u32 * CELL;
            let y0 = cell.row as u32 * CELL;
            for dy in 0..CELL {
                for dx in 0..CELL {
                    out.put_pixel(x0 + dx, y0 + dy, Rgba([shade, shade, shade, 255]));
                }
            }
        }
        out
    }

    fn test_config() -> Config {
        Config {
            board: BoardRect {
                x: 0,
                y: 0,
                size: BOARD,
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_first_tick_is_baseline_only() {
        let sink = RecordingSink::default();
        let sampler = ScriptedSampler::new(vec![Ok(board_frame(60))]);
        let detector = Detector::new(sampler, sink.clone(), &test_config());

        detector.tick();
        assert!(sink.moves().is_empty());
        assert_eq!(sink.log(), vec!["Baseline captured"]);
    }

    #[test]
    fn test_second_tick_reports_the_move() {
        // d7 vacated, d5 occupied; origin precedes destination in row-major order
        let base = board_frame(60);
        let moved = with_repainted(&base, &[Cell::new(1, 3), Cell::new(3, 3)], 220);
        let sink = RecordingSink::default();
        let detector = Detector::new(
            ScriptedSampler::new(vec![Ok(base), Ok(moved)]),
            sink.clone(),
            &test_config(),
        );

        detector.tick();
        detector.tick();
        assert_eq!(sink.moves(), vec!["d7d5"]);
    }

    #[test]
    fn test_failed_sample_keeps_previous_snapshot() {
        let base = board_frame(60);
        let moved = with_repainted(&base, &[Cell::new(1, 3), Cell::new(3, 3)], 220);
        let sink = RecordingSink::default();
        let detector = Detector::new(
            ScriptedSampler::new(vec![
                Ok(base),
                Err(DetectError::CaptureUnavailable("display asleep".into())),
                Ok(moved),
            ]),
            sink.clone(),
            &test_config(),
        );

        detector.tick(); // baseline
        detector.tick(); // failure - snapshot must survive
        detector.tick(); // diffs against the first baseline
        assert_eq!(sink.moves(), vec!["d7d5"]);
        assert!(sink.log().iter().any(|l| l.contains("display asleep")));
    }

    #[test]
    fn test_flip_changes_notation_not_detection() {
        let base = board_frame(60);
        let cells = [Cell::new(1, 3), Cell::new(3, 3)];
        let first = with_repainted(&base, &cells, 220);
        let second = with_repainted(&base, &cells, 140);
        let sink = RecordingSink::default();
        let detector = Detector::new(
            ScriptedSampler::new(vec![Ok(base), Ok(first), Ok(second)]),
            sink.clone(),
            &test_config(),
        );

        detector.tick();
        detector.tick();
        detector.flip();
        detector.tick();
        // Same two cells both times; only the notation moved with the flip
        assert_eq!(sink.moves(), vec!["d7d5", "e2e4"]);
        assert!(sink.log().iter().any(|l| l == "Board flipped: Black bottom"));
    }

    #[test]
    fn test_non_two_arity_changes_log_no_move() {
        let base = board_frame(60);
        let same = base.clone();
        let three = with_repainted(
            &base,
            &[Cell::new(0, 4), Cell::new(0, 6), Cell::new(0, 7)],
            220,
        );
        let sink = RecordingSink::default();
        let detector = Detector::new(
            ScriptedSampler::new(vec![Ok(base), Ok(same), Ok(three)]),
            sink.clone(),
            &test_config(),
        );

        detector.tick(); // baseline
        detector.tick(); // zero changed cells
        detector.tick(); // three changed cells (castling-like artifact)
        assert!(sink.moves().is_empty());
        assert_eq!(
            sink.log(),
            vec!["Baseline captured", "No move detected", "No move detected"]
        );
    }

    #[test]
    fn test_out_of_bounds_region_skips_tick() {
        let sink = RecordingSink::default();
        let config = Config {
            board: BoardRect {
                x: 900,
                y: 0,
                size: 800,
            },
            ..Config::default()
        };
        let detector = Detector::new(
            ScriptedSampler::new(vec![Ok(RgbaImage::new(1000, 2000))]),
            sink.clone(),
            &config,
        );

        detector.tick();
        assert!(sink.moves().is_empty());
        assert!(sink.log().iter().any(|l| l.contains("exceeds frame bounds")));
    }

    #[test]
    fn test_start_stop_transitions_and_logs() {
        let sink = RecordingSink::default();
        let mut detector = Detector::new(ScriptedSampler::new(vec![]), sink.clone(), &test_config());

        assert!(!detector.is_running());
        detector.start();
        assert!(detector.is_running());
        detector.start(); // no-op, must not spawn a second worker
        detector.stop();
        assert!(!detector.is_running());
        detector.stop(); // no-op

        let log = sink.log();
        assert_eq!(log.iter().filter(|l| *l == "Detection started...").count(), 1);
        assert_eq!(log.iter().filter(|l| *l == "Detection stopped").count(), 1);
    }

    #[test]
    fn test_snapshot_survives_stop_and_start() {
        let base = board_frame(60);
        let moved = with_repainted(&base, &[Cell::new(0, 6), Cell::new(2, 5)], 220);
        let sink = RecordingSink::default();
        let mut detector = Detector::new(
            ScriptedSampler::new(vec![Ok(base), Ok(moved)]),
            sink.clone(),
            &test_config(),
        );

        detector.tick(); // baseline
        detector.stop(); // idle no-op, must not clear the snapshot
        detector.tick(); // diffs against the snapshot from before the stop
        assert_eq!(sink.moves(), vec!["g8f6"]);
    }
}
