//! Capture area: the 88 key segments plus the servo tracker that shifts
//! them, driven by two cadences.
//!
//! A capture area only exists once calibration has parsed, so the
//! uninitialized state is simply "no `CaptureArea` yet". From there it is
//! `Active` until [`CaptureArea::stop`] (or drop), then `Stopped` for good.

use crate::cadence::Cadence;
use crate::calibration::CalibrationMap;
use crate::config::DetectorConfig;
use crate::error::CaptureResult;
use crate::frame::FrameSampler;
use crate::playback::NotePlayer;
use crate::segment::{KeySegment, SegmentParams};
use crate::servo::ServoTracker;
use crate::types::{KeyFrame, Rect};
use log::{debug, info};

/// Drawing collaborator for the sensing-rectangle overlay.
pub trait RenderSink {
    fn draw(&mut self, rects: &[Rect]);
}

/// Keeps the latest overlay.
impl RenderSink for Vec<Rect> {
    fn draw(&mut self, rects: &[Rect]) {
        self.clear();
        self.extend_from_slice(rects);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Active,
    Stopped,
}

pub struct CaptureArea<P: NotePlayer> {
    row: i32,
    segments: Vec<KeySegment>,
    servo: ServoTracker,
    servo_cadence: Cadence,
    state: CaptureState,
    player: P,
}

impl<P: NotePlayer> CaptureArea<P> {
    /// Parse operator text and build the area. Nothing is built on error.
    pub fn parse(
        text: &str,
        row: i32,
        config: &DetectorConfig,
        player: P,
        now_us: u64,
    ) -> CaptureResult<Self> {
        let calibration = CalibrationMap::parse(text)?;
        Ok(Self::new(&calibration, row, config, player, now_us))
    }

    /// Build from raw boundaries. Fails with `InvalidCalibration` if fewer
    /// than 89 are given.
    pub fn from_boundaries(
        boundaries: &[i32],
        row: i32,
        config: &DetectorConfig,
        player: P,
        now_us: u64,
    ) -> CaptureResult<Self> {
        let calibration = CalibrationMap::from_boundaries(boundaries)?;
        Ok(Self::new(&calibration, row, config, player, now_us))
    }

    /// Build from a parsed calibration and start the servo cadence at `now_us`.
    pub fn new(
        calibration: &CalibrationMap,
        row: i32,
        config: &DetectorConfig,
        player: P,
        now_us: u64,
    ) -> Self {
        let params = SegmentParams::from(config);
        let segments = calibration
            .spans()
            .iter()
            .enumerate()
            .map(|(i, &span)| KeySegment::new(i, span, row, params))
            .collect();

        info!(
            "Capture area: row {}, keys span x={}..{}, servo every {}ms",
            row,
            calibration.left(),
            calibration.right(),
            config.servo_interval_ms
        );

        Self {
            row,
            segments,
            servo: ServoTracker::new(config.servo, row),
            servo_cadence: Cadence::new(config.servo_interval_us(), now_us),
            state: CaptureState::Active,
            player,
        }
    }

    /// One frame tick: refresh the servo if its cadence is due, then
    /// evaluate every key. Returns the number of note calls issued.
    pub fn tick(&mut self, sampler: &dyn FrameSampler, now_us: u64) -> usize {
        if self.state != CaptureState::Active {
            return 0;
        }
        if self.servo_cadence.due(now_us) {
            self.refresh_servo(sampler);
        }
        self.evaluate_all(sampler)
    }

    /// Rescan the servo strip. No-op once stopped.
    pub fn refresh_servo(&mut self, sampler: &dyn FrameSampler) -> i32 {
        if self.state == CaptureState::Active {
            self.servo.refresh(sampler);
        }
        self.servo.offset()
    }

    /// Evaluate keys 0 → 87 against one frame and one offset snapshot.
    pub fn evaluate_all(&mut self, sampler: &dyn FrameSampler) -> usize {
        if self.state != CaptureState::Active {
            return 0;
        }
        let offset = self.servo.offset();
        let mut calls = 0;
        for segment in &mut self.segments {
            if segment.evaluate(sampler, offset, &mut self.player).is_some() {
                calls += 1;
            }
        }
        calls
    }

    /// Cancel the servo cadence and silence every sounding key.
    pub fn stop(&mut self) {
        if self.state == CaptureState::Stopped {
            return;
        }
        self.servo_cadence.cancel();
        let mut silenced = 0;
        for segment in &mut self.segments {
            if segment.force_stop(&mut self.player) {
                silenced += 1;
            }
        }
        self.state = CaptureState::Stopped;
        info!("Capture area stopped ({} sounding keys silenced)", silenced);
    }

    /// Sensing rectangle of every key, index order.
    pub fn render_contract(&self) -> Vec<Rect> {
        self.segments.iter().map(|s| s.rect()).collect()
    }

    pub fn render(&self, sink: &mut dyn RenderSink) {
        sink.draw(&self.render_contract());
    }

    pub fn sounding(&self) -> Vec<bool> {
        self.segments.iter().map(|s| s.is_sounding()).collect()
    }

    pub fn key_frame(&self, timestamp_us: u64) -> KeyFrame {
        KeyFrame {
            timestamp_us,
            servo_offset: self.servo.offset(),
            servo_signal: !self.servo.signal_lost(),
            sounding: self.sounding(),
            rects: self.render_contract(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn row(&self) -> i32 {
        self.row
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    pub fn servo(&self) -> &ServoTracker {
        &self.servo
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }
}

impl<P: NotePlayer> Drop for CaptureArea<P> {
    fn drop(&mut self) {
        if self.state == CaptureState::Active {
            debug!("Capture area dropped while active, stopping");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::uniform_boundaries;
    use crate::error::CaptureError;
    use crate::frame::Frame;
    use crate::frequency::key_frequency;
    use crate::playback::NoteRecorder;
    use crate::types::{NoteKind, BLACK, BRIGHT, KEY_COUNT};

    const ROW: i32 = 3;

    fn area() -> CaptureArea<NoteRecorder> {
        // Keys start at x=60 so the servo strip (x 0..50) stays clear of them.
        CaptureArea::from_boundaries(
            &uniform_boundaries(60, 10),
            ROW,
            &DetectorConfig::default(),
            NoteRecorder::new(),
            0,
        )
        .unwrap()
    }

    /// White sensing row with the servo marker at strip index `edge`.
    fn frame(edge: Option<i32>) -> Frame {
        let mut f = Frame::filled(0, 1000, 8, BRIGHT);
        f.fill_rect(Rect::new(0, ROW, 50, 1), BLACK);
        if let Some(x) = edge {
            f.fill_rect(Rect::new(x, ROW, 50 - x, 1), BRIGHT);
        }
        f
    }

    fn press(f: &mut Frame, key: usize, shift: i32) {
        f.fill_rect(Rect::new(60 + key as i32 * 10 + shift, ROW, 10, 1), BLACK);
    }

    #[test]
    fn test_builds_88_segments() {
        let a = area();
        assert_eq!(a.segments().len(), KEY_COUNT);
        assert_eq!(a.state(), CaptureState::Active);
        for (i, s) in a.segments().iter().enumerate() {
            assert_eq!(s.key_index(), i);
        }
    }

    #[test]
    fn test_short_calibration_builds_nothing() {
        let b = uniform_boundaries(0, 10);
        let result = CaptureArea::from_boundaries(
            &b[..40],
            ROW,
            &DetectorConfig::default(),
            NoteRecorder::new(),
            0,
        );
        assert!(matches!(result, Err(CaptureError::InvalidCalibration { found: 40 })));

        let result = CaptureArea::parse("0 10 20", ROW, &DetectorConfig::default(), NoteRecorder::new(), 0);
        assert!(matches!(result, Err(CaptureError::InvalidCalibration { found: 3 })));
    }

    #[test]
    fn test_render_contract_matches_calibration() {
        let a = area();
        let rects = a.render_contract();
        assert_eq!(rects.len(), KEY_COUNT);
        assert_eq!(rects[0], Rect::new(60, ROW, 10, 1));
        assert_eq!(rects[87], Rect::new(930, ROW, 10, 1));

        let mut sink: Vec<Rect> = Vec::new();
        a.render(&mut sink);
        assert_eq!(sink, rects);
    }

    #[test]
    fn test_evaluate_all_only_pressed_keys() {
        let mut a = area();
        let mut f = frame(Some(13));
        press(&mut f, 10, 0);
        press(&mut f, 50, 0);
        assert_eq!(a.evaluate_all(&f), 2);
        let sounding: Vec<usize> = (0..KEY_COUNT).filter(|&k| a.sounding()[k]).collect();
        assert_eq!(sounding, vec![10, 50]);
        let freqs: Vec<f64> = a.player().starts().map(|e| e.frequency).collect();
        assert_eq!(freqs, vec![key_frequency(10), key_frequency(50)]);
    }

    #[test]
    fn test_servo_refresh_follows_cadence() {
        let mut a = area();
        let f = frame(Some(16));
        for t in (0..1000).step_by(5) {
            a.tick(&f, t * 1000);
            assert_eq!(a.servo().offset(), 0, "no refresh before the first interval");
        }
        a.tick(&f, 1_000_000);
        assert_eq!(a.servo().offset(), 3);
    }

    #[test]
    fn test_servo_refresh_applies_to_same_tick() {
        let mut a = area();
        // Marker at 23 means a +10 shift: key 20 now sits where key 21 was
        // calibrated. Only a refreshed offset attributes it to key 20.
        let mut f = frame(Some(23));
        press(&mut f, 20, 10);
        assert_eq!(a.tick(&f, 1_000_000), 1);
        assert_eq!(a.servo().offset(), 10);
        assert!(a.sounding()[20]);
        assert!(!a.sounding()[21]);
        let start = a.player().starts().next().unwrap();
        assert_eq!(start.frequency, key_frequency(20));
    }

    #[test]
    fn test_offset_applies_to_every_key() {
        let mut a = area();
        let mut f = frame(Some(17));
        a.refresh_servo(&f);
        assert_eq!(a.servo().offset(), 4);

        // The key moved 4px right; its calibrated position is now white.
        press(&mut f, 20, 4);
        a.evaluate_all(&f);
        assert!(a.sounding()[20]);
        assert!(!a.sounding()[19]);
        assert!(!a.sounding()[21]);
        for (i, r) in a.render_contract().iter().enumerate() {
            assert_eq!(r.x, 64 + i as i32 * 10);
        }
    }

    #[test]
    fn test_signal_lost_uses_perfect_as_offset() {
        let mut a = area();
        assert_eq!(a.refresh_servo(&frame(None)), 13);
        assert!(a.servo().signal_lost());
        assert!(!a.key_frame(0).servo_signal);
    }

    #[test]
    fn test_stop_silences_and_freezes() {
        let mut a = area();
        let mut f = frame(Some(13));
        press(&mut f, 5, 0);
        press(&mut f, 6, 0);
        a.evaluate_all(&f);
        a.stop();
        assert_eq!(a.state(), CaptureState::Stopped);
        assert!(a.sounding().iter().all(|&s| !s));
        assert_eq!(a.player().stops().count(), 2);

        assert_eq!(a.evaluate_all(&f), 0);
        assert_eq!(a.tick(&frame(Some(40)), 5_000_000), 0);
        assert_eq!(a.servo().offset(), 0);
        a.stop();
        assert_eq!(a.player().events.len(), 4);
    }

    #[test]
    fn test_drop_stops_sounding_keys() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Shared(Rc<RefCell<Vec<NoteKind>>>);
        impl NotePlayer for Shared {
            fn note_start(&mut self, _: f64) {
                self.0.borrow_mut().push(NoteKind::Start);
            }
            fn note_stop(&mut self, _: f64) {
                self.0.borrow_mut().push(NoteKind::Stop);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let mut a = CaptureArea::from_boundaries(
                &uniform_boundaries(60, 10),
                ROW,
                &DetectorConfig::default(),
                Shared(log.clone()),
                0,
            )
            .unwrap();
            let mut f = frame(Some(13));
            press(&mut f, 30, 0);
            a.evaluate_all(&f);
        }
        assert_eq!(*log.borrow(), vec![NoteKind::Start, NoteKind::Stop]);
    }
}
