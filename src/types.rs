use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

// ─── Layout constants ───────────────────────────────────────────────────────

/// Keys on a full-size piano.
pub const KEY_COUNT: usize = 88;

/// Calibration boundaries: one left edge per key plus the right edge of the last.
pub const BOUNDARY_COUNT: usize = KEY_COUNT + 1;

/// Channel value of a black pixel after thresholding.
pub const BLACK: u8 = 0;

/// Channel value of a bright pixel after thresholding.
pub const BRIGHT: u8 = 255;

/// Channels per sampled pixel (RGBA).
pub const CHANNELS: usize = 4;

// ─── Geometry ───────────────────────────────────────────────────────────────

/// A rectangle in frame-pixel coordinates. `x` may go negative once the
/// servo offset is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}×{}", self.x, self.y, self.width, self.height)
    }
}

// ─── Note events ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    Start,
    Stop,
}

/// One call into the playback collaborator, stamped for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Microseconds since session start (timestamp of the frame that caused it)
    pub timestamp_us: u64,
    pub kind: NoteKind,
    pub frequency: f64,
}

impl fmt::Display for NoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            NoteKind::Start => "start",
            NoteKind::Stop => "stop ",
        };
        write!(f, "t={:>10}µs  {} {:>8.2} Hz", self.timestamp_us, kind, self.frequency)
    }
}

// ─── Per-frame snapshot ─────────────────────────────────────────────────────

/// State of the capture area after one frame tick, for display consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFrame {
    pub timestamp_us: u64,
    /// Servo offset applied during this tick
    pub servo_offset: i32,
    /// False when the last servo refresh found no bright pixel
    pub servo_signal: bool,
    /// Which keys are sounding after this tick
    pub sounding: Vec<bool>,
    /// Sensing rectangle per key (the render contract)
    pub rects: Vec<Rect>,
}

impl KeyFrame {
    pub fn sounding_count(&self) -> usize {
        self.sounding.iter().filter(|&&s| s).count()
    }
}

// ─── Inter-thread messages ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum InputEvent {
    /// A new captured (and already thresholded) frame.
    Frame(Frame),
    /// Operator (re-)issued calibration: raw boundary text and sensing row.
    Calibrate { boundaries: String, row: i32 },
    /// Operator stopped the capture area.
    Stop,
}

// ─── Session clock ──────────────────────────────────────────────────────────

/// Monotonic clock for the capture session.
#[derive(Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}
