use crate::config::DetectorConfig;
use crate::frame::Frame;
use crate::frame_reader::FrameFileWriter;
use crate::frequency::note_name;
use crate::types::*;
use crossbeam_channel::Sender;
use log::{info, warn};
use std::thread;
use std::time::Duration;

/// Gray level of a depressed key as the camera sees it, before thresholding.
const PRESSED_LEVEL: u8 = 30;
/// Gray level of a key at rest.
const REST_LEVEL: u8 = 220;
/// Gray level of the servo strip away from the marker.
const STRIP_LEVEL: u8 = 15;
/// Gray level of the servo marker.
const MARKER_LEVEL: u8 = 250;

/// Renders synthetic camera frames of the keyboard row so the whole
/// pipeline can run without a camera.
///
/// Each frame is drawn from the current [`SimState`]: keys at their
/// calibrated positions shifted by the physical drift, depressed keys dark,
/// and the servo marker at `perfect + drift` in the strip. The sensing row
/// is then thresholded with the configured clamp, like the capture
/// front-end does, so the detector sees exactly 0 or 255.
pub struct Simulator {
    clock: SessionClock,
    tx: Sender<InputEvent>,
    config: DetectorConfig,
    boundaries: Vec<i32>,
    row: i32,
    recorder: Option<FrameFileWriter>,
}

/// Physical state of the keyboard and servo carriage.
#[derive(Debug, Clone, Default)]
pub struct SimState {
    pub pressed: Vec<usize>,
    /// Horizontal drift of the whole sensor, in pixels
    pub drift: i32,
    /// Marker hidden (servo signal lost)
    pub marker_hidden: bool,
}

impl Simulator {
    pub fn new(
        clock: SessionClock,
        tx: Sender<InputEvent>,
        config: DetectorConfig,
        boundaries: Vec<i32>,
        row: i32,
    ) -> Self {
        Self {
            clock,
            tx,
            config,
            boundaries,
            row,
            recorder: None,
        }
    }

    /// Also write every emitted frame to a replay file.
    pub fn with_recorder(mut self, recorder: FrameFileWriter) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Run a named demo sequence. Blocks the calling thread until the script
    /// ends.
    pub fn run(&mut self, demo: &str) {
        let gestures = match demo {
            "scale" => scale_sequence(),
            "drift" => drift_sequence(),
            other => {
                if other != "basic" {
                    warn!("Unknown demo '{}', playing 'basic'", other);
                }
                basic_sequence()
            }
        };
        info!("Simulator starting '{}' sequence ({} steps)...", demo, gestures.len());

        let mut state = SimState::default();
        for gesture in &gestures {
            self.execute(gesture, &mut state);
        }

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.flush() {
                warn!("Failed to flush frame recording: {}", e);
            }
        }
        info!("Simulator sequence complete.");
    }

    fn execute(&mut self, gesture: &Gesture, state: &mut SimState) {
        match gesture {
            Gesture::Hold { ms } => {
                let ticks = *ms as u64 / self.config.frame_interval_ms.max(1);
                for _ in 0..ticks {
                    self.emit_tick(state);
                }
            }

            Gesture::Press { keys } => {
                let names: Vec<String> = keys.iter().map(|&k| note_name(k)).collect();
                info!("  press [{}]", names.join(", "));
                for &k in keys {
                    if k < KEY_COUNT && !state.pressed.contains(&k) {
                        state.pressed.push(k);
                    }
                }
            }

            Gesture::Release { keys } => {
                let names: Vec<String> = keys.iter().map(|&k| note_name(k)).collect();
                info!("  release [{}]", names.join(", "));
                state.pressed.retain(|k| !keys.contains(k));
            }

            Gesture::ReleaseAll => {
                info!("  release all");
                state.pressed.clear();
            }

            Gesture::Drift { px } => {
                info!("  sensor drift {} → {} px", state.drift, px);
                state.drift = *px;
            }

            Gesture::HideMarker { hidden } => {
                info!("  servo marker {}", if *hidden { "hidden" } else { "visible" });
                state.marker_hidden = *hidden;
            }
        }
    }

    fn emit_tick(&mut self, state: &SimState) {
        let frame = self.render(state, self.clock.now_us());
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.write_frame(&frame) {
                warn!("Frame recording stopped: {}", e);
                self.recorder = None;
            }
        }
        let _ = self.tx.send(InputEvent::Frame(frame));
        thread::sleep(Duration::from_millis(self.config.frame_interval_ms));
    }

    /// Draw one thresholded frame for `state`.
    pub fn render(&self, state: &SimState, timestamp_us: u64) -> Frame {
        render_frame(&self.config, &self.boundaries, self.row, state, timestamp_us)
    }
}

/// Draw one thresholded frame of the keyboard row.
pub fn render_frame(
    config: &DetectorConfig,
    boundaries: &[i32],
    row: i32,
    state: &SimState,
    timestamp_us: u64,
) -> Frame {
    let mut frame = Frame::filled(timestamp_us, config.frame_width, config.frame_height, REST_LEVEL);
    let height = config.segment_height;

    for &key in &state.pressed {
        if key + 1 < boundaries.len() {
            let x = boundaries[key].saturating_add(state.drift);
            let width = boundaries[key + 1].saturating_sub(boundaries[key]);
            frame.fill_rect(Rect::new(x, row, width, height), PRESSED_LEVEL);
        }
    }

    let servo = config.servo;
    frame.fill_rect(Rect::new(servo.x, row, servo.width, 1), STRIP_LEVEL);
    if !state.marker_hidden {
        let marker = (servo.perfect + state.drift).clamp(0, servo.width - 1);
        frame.fill_rect(Rect::new(servo.x + marker, row, servo.width - marker, 1), MARKER_LEVEL);
    }

    frame.binarize_rows(row, height, config.clamp);
    frame
}

// ─── Gesture types ──────────────────────────────────────────────────────────

pub enum Gesture {
    Hold { ms: u32 },
    Press { keys: Vec<usize> },
    Release { keys: Vec<usize> },
    ReleaseAll,
    Drift { px: i32 },
    HideMarker { hidden: bool },
}

/// Middle C, a C major triad, then a short staccato run.
fn basic_sequence() -> Vec<Gesture> {
    use Gesture::*;
    vec![
        Hold { ms: 1200 },
        Press { keys: vec![39] },
        Hold { ms: 400 },
        ReleaseAll,
        Hold { ms: 300 },
        Press { keys: vec![39, 43, 46] },
        Hold { ms: 800 },
        ReleaseAll,
        Hold { ms: 300 },
        Press { keys: vec![51] },
        Hold { ms: 20 },
        ReleaseAll,
        Hold { ms: 100 },
        Press { keys: vec![53] },
        Hold { ms: 20 },
        ReleaseAll,
        Hold { ms: 500 },
    ]
}

/// C major scale up from middle C.
fn scale_sequence() -> Vec<Gesture> {
    use Gesture::*;
    let mut g = vec![Hold { ms: 1200 }];
    for key in [39, 41, 43, 44, 46, 48, 50, 51] {
        g.push(Press { keys: vec![key] });
        g.push(Hold { ms: 250 });
        g.push(ReleaseAll);
        g.push(Hold { ms: 60 });
    }
    g.push(Hold { ms: 500 });
    g
}

/// Held chord while the carriage drifts and briefly loses its marker.
fn drift_sequence() -> Vec<Gesture> {
    use Gesture::*;
    vec![
        Hold { ms: 1200 },
        Press { keys: vec![39, 43, 46] },
        Hold { ms: 500 },
        Drift { px: 3 },
        Hold { ms: 1500 },
        Drift { px: -2 },
        Hold { ms: 1500 },
        HideMarker { hidden: true },
        Hold { ms: 1200 },
        HideMarker { hidden: false },
        Drift { px: 0 },
        Hold { ms: 1200 },
        ReleaseAll,
        Hold { ms: 500 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::uniform_boundaries;
    use crate::frame::FrameSampler;

    const ROW: i32 = 100;

    fn render(state: &SimState) -> Frame {
        render_frame(&DetectorConfig::default(), &uniform_boundaries(56, 6), ROW, state, 0)
    }

    #[test]
    fn test_rest_frame_is_white_outside_strip() {
        let f = render(&SimState::default());
        let keys = f.sample(Rect::new(56, ROW, 528, 1));
        assert!(keys.iter().all(|&v| v == BRIGHT));
    }

    #[test]
    fn test_pressed_key_is_black_after_threshold() {
        let state = SimState {
            pressed: vec![39],
            ..SimState::default()
        };
        let f = render(&state);
        let x = 56 + 39 * 6;
        assert_eq!(f.red_at(x, ROW), Some(BLACK));
        assert_eq!(f.red_at(x + 5, ROW), Some(BLACK));
        assert_eq!(f.red_at(x + 6, ROW), Some(BRIGHT));
        assert_eq!(f.red_at(x - 1, ROW), Some(BRIGHT));
        assert_eq!(f.red_at(x, ROW - 1), Some(REST_LEVEL), "only the sensing row is thresholded");
    }

    #[test]
    fn test_marker_follows_drift() {
        let state = SimState {
            drift: 4,
            ..SimState::default()
        };
        let f = render(&state);
        assert_eq!(f.red_at(16, ROW), Some(BLACK));
        assert_eq!(f.red_at(17, ROW), Some(BRIGHT));
    }

    #[test]
    fn test_hidden_marker_leaves_strip_dark() {
        let state = SimState {
            marker_hidden: true,
            ..SimState::default()
        };
        let f = render(&state);
        let strip = f.sample(Rect::new(0, ROW, 50, 1));
        assert!(strip.chunks_exact(CHANNELS).all(|px| px[0] == BLACK));
    }
}
