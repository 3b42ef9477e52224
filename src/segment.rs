use crate::calibration::KeySpan;
use crate::config::{DetectorConfig, StopPolicy};
use crate::frame::FrameSampler;
use crate::frequency::{key_frequency, note_name};
use crate::playback::NotePlayer;
use crate::types::{NoteKind, Rect, BLACK};
use log::debug;

/// Detection parameters shared by every segment of a capture area.
#[derive(Debug, Clone, Copy)]
pub struct SegmentParams {
    pub height: i32,
    pub debounce_ticks: i32,
    pub min_black_pixels: usize,
    pub stop_policy: StopPolicy,
}

impl From<&DetectorConfig> for SegmentParams {
    fn from(c: &DetectorConfig) -> Self {
        Self {
            height: c.segment_height,
            debounce_ticks: c.debounce_ticks,
            min_black_pixels: c.min_black_pixels,
            stop_policy: c.stop_policy,
        }
    }
}

/// Per-key detector: a calibrated sensing rectangle plus a monostable.
///
/// # Monostable
///
/// Any black sample inside the rectangle (more than `min_black_pixels`)
/// retriggers the counter to `debounce_ticks`. Otherwise it counts down one
/// per tick and holds at zero. The key sounds while the counter is positive,
/// so a single dark frame holds the note for `debounce_ticks` ticks and
/// flicker shorter than that never reaches the synthesizer.
pub struct KeySegment {
    key_index: usize,
    frequency: f64,
    base_x: i32,
    y: i32,
    width: i32,
    current_x: i32,
    counter: i32,
    sounding: bool,
    params: SegmentParams,
}

impl KeySegment {
    pub fn new(key_index: usize, span: KeySpan, y: i32, params: SegmentParams) -> Self {
        Self {
            key_index,
            frequency: key_frequency(key_index),
            base_x: span.x,
            y,
            width: span.width,
            current_x: span.x,
            counter: 0,
            sounding: false,
            params,
        }
    }

    /// Run one frame tick against `servo_offset`. Returns the note call
    /// issued, if any.
    pub fn evaluate(
        &mut self,
        sampler: &dyn FrameSampler,
        servo_offset: i32,
        player: &mut dyn NotePlayer,
    ) -> Option<NoteKind> {
        self.current_x = self.base_x.saturating_add(servo_offset);

        if self.is_pressed(sampler) {
            self.counter = self.params.debounce_ticks;
        } else {
            self.counter = (self.counter - 1).max(0);
        }

        if self.counter > 0 {
            if !self.sounding {
                debug!("key {:>2} {:<4} start {:.2} Hz", self.key_index, note_name(self.key_index), self.frequency);
                player.note_start(self.frequency);
                self.sounding = true;
                return Some(NoteKind::Start);
            }
            None
        } else {
            let edge = self.sounding;
            self.sounding = false;
            if edge || self.params.stop_policy == StopPolicy::EveryTick {
                if edge {
                    debug!("key {:>2} {:<4} stop  {:.2} Hz", self.key_index, note_name(self.key_index), self.frequency);
                }
                player.note_stop(self.frequency);
                return Some(NoteKind::Stop);
            }
            None
        }
    }

    /// Silence the key now, regardless of the counter.
    pub fn force_stop(&mut self, player: &mut dyn NotePlayer) -> bool {
        self.counter = 0;
        if self.sounding {
            player.note_stop(self.frequency);
            self.sounding = false;
            return true;
        }
        false
    }

    fn is_pressed(&self, sampler: &dyn FrameSampler) -> bool {
        let black = sampler
            .sample(self.rect())
            .iter()
            .filter(|&&v| v == BLACK)
            .count();
        black > self.params.min_black_pixels
    }

    /// Current sensing rectangle (servo offset applied at the last tick).
    pub fn rect(&self) -> Rect {
        Rect::new(self.current_x, self.y, self.width, self.params.height)
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn base_x(&self) -> i32 {
        self.base_x
    }

    pub fn counter(&self) -> i32 {
        self.counter
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::playback::NoteRecorder;
    use crate::types::BRIGHT;

    const ROW: i32 = 2;

    fn params() -> SegmentParams {
        SegmentParams::from(&DetectorConfig::default())
    }

    fn segment() -> KeySegment {
        KeySegment::new(39, KeySpan { x: 20, width: 10 }, ROW, params())
    }

    fn white() -> Frame {
        Frame::filled(0, 100, 5, BRIGHT)
    }

    fn dark_at(x: i32, width: i32) -> Frame {
        let mut f = white();
        f.fill_rect(Rect::new(x, ROW, width, 1), BLACK);
        f
    }

    #[test]
    fn test_single_press_holds_ten_ticks() {
        let mut seg = segment();
        let mut rec = NoteRecorder::new();

        assert_eq!(seg.evaluate(&dark_at(20, 10), 0, &mut rec), Some(NoteKind::Start));
        assert!(seg.is_sounding());
        assert_eq!(seg.counter(), 10);

        for tick in 1..=9 {
            assert_eq!(seg.evaluate(&white(), 0, &mut rec), None, "tick {}", tick);
            assert!(seg.is_sounding(), "should still sound after {} white ticks", tick);
        }

        assert_eq!(seg.evaluate(&white(), 0, &mut rec), Some(NoteKind::Stop));
        assert!(!seg.is_sounding());
        assert_eq!(rec.starts().count(), 1);
        assert_eq!(rec.stops().count(), 1);
    }

    #[test]
    fn test_retrigger_extends_hold() {
        let mut seg = segment();
        let mut rec = NoteRecorder::new();
        seg.evaluate(&dark_at(20, 1), 0, &mut rec);
        for _ in 0..5 {
            seg.evaluate(&white(), 0, &mut rec);
        }
        seg.evaluate(&dark_at(29, 1), 0, &mut rec);
        for _ in 0..9 {
            seg.evaluate(&white(), 0, &mut rec);
            assert!(seg.is_sounding());
        }
        assert_eq!(rec.events.len(), 1, "flicker must not restart the note");
    }

    #[test]
    fn test_counter_holds_at_zero_and_stop_is_edge_triggered() {
        let mut seg = segment();
        let mut rec = NoteRecorder::new();
        seg.evaluate(&dark_at(20, 10), 0, &mut rec);
        for _ in 0..100 {
            seg.evaluate(&white(), 0, &mut rec);
            assert!(seg.counter() >= 0);
        }
        assert_eq!(seg.counter(), 0);
        assert_eq!(rec.stops().count(), 1);
    }

    #[test]
    fn test_never_pressed_never_stops_under_edge_policy() {
        let mut seg = segment();
        let mut rec = NoteRecorder::new();
        for _ in 0..20 {
            assert_eq!(seg.evaluate(&white(), 0, &mut rec), None);
        }
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_every_tick_policy_repeats_stop() {
        let p = SegmentParams {
            stop_policy: StopPolicy::EveryTick,
            ..params()
        };
        let mut seg = KeySegment::new(39, KeySpan { x: 20, width: 10 }, ROW, p);
        let mut rec = NoteRecorder::new();
        for _ in 0..3 {
            assert_eq!(seg.evaluate(&white(), 0, &mut rec), Some(NoteKind::Stop));
        }
        assert_eq!(rec.stops().count(), 3);
        assert_eq!(rec.starts().count(), 0);
    }

    #[test]
    fn test_servo_offset_shifts_sensing_rect() {
        let mut seg = segment();
        let mut rec = NoteRecorder::new();
        // Dark pixels left of the calibrated span, reachable only with a -5 shift.
        let f = dark_at(15, 4);
        assert_eq!(seg.evaluate(&f, 0, &mut rec), None);
        assert_eq!(seg.rect(), Rect::new(20, ROW, 10, 1));
        assert_eq!(seg.evaluate(&f, -5, &mut rec), Some(NoteKind::Start));
        assert_eq!(seg.rect(), Rect::new(15, ROW, 10, 1));
        assert_eq!(seg.base_x(), 20);
    }

    #[test]
    fn test_offset_at_coordinate_limit_saturates() {
        let mut seg = KeySegment::new(87, KeySpan { x: i32::MAX - 5, width: 5 }, ROW, params());
        let mut rec = NoteRecorder::new();
        assert_eq!(seg.evaluate(&white(), 100, &mut rec), None);
        assert_eq!(seg.rect(), Rect::new(i32::MAX, ROW, 5, 1));
        assert_eq!(seg.rect().right(), i32::MAX);
    }

    #[test]
    fn test_min_black_threshold() {
        let p = SegmentParams {
            min_black_pixels: 6,
            ..params()
        };
        let mut seg = KeySegment::new(0, KeySpan { x: 20, width: 10 }, ROW, p);
        let mut rec = NoteRecorder::new();
        // Two black pixels = six black channel samples (RGB), not more than 6.
        assert_eq!(seg.evaluate(&dark_at(20, 2), 0, &mut rec), None);
        assert_eq!(seg.evaluate(&dark_at(20, 3), 0, &mut rec), Some(NoteKind::Start));
    }

    #[test]
    fn test_force_stop() {
        let mut seg = segment();
        let mut rec = NoteRecorder::new();
        assert!(!seg.force_stop(&mut rec));
        seg.evaluate(&dark_at(20, 10), 0, &mut rec);
        assert!(seg.force_stop(&mut rec));
        assert!(!seg.is_sounding());
        assert_eq!(seg.counter(), 0);
        assert_eq!(rec.stops().count(), 1);
    }

    #[test]
    fn test_frequency_from_key_index() {
        let seg = segment();
        assert!((seg.frequency() - 261.63).abs() < 0.01);
        assert_eq!(seg.key_index(), 39);
    }
}
