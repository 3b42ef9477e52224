use crate::capture_area::{CaptureArea, CaptureState};
use crate::config::DetectorConfig;
use crate::frame::Frame;
use crate::playback::ChannelPlayer;
use crate::types::*;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, trace};

/// Events queued ahead of the coordinator. Each frame carries a whole RGBA
/// buffer, so a stalled coordinator blocks the producer past this depth.
pub const INPUT_QUEUE_DEPTH: usize = 8;

/// The input channel feeding [`Coordinator::run`].
pub fn input_channel() -> (Sender<InputEvent>, Receiver<InputEvent>) {
    bounded(INPUT_QUEUE_DEPTH)
}

/// Counters reported when the coordinator shuts down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Frames evaluated by a capture area
    pub frames: u64,
    /// Frames that arrived with no capture area, or a stopped one
    pub ignored_frames: u64,
    /// Note calls issued (starts and stops)
    pub notes: u64,
    pub calibrations: u64,
    pub rejected_calibrations: u64,
}

/// The coordinator owns the capture area and is the only thread that
/// touches it. It receives InputEvents (frames and operator commands),
/// ticks the area once per frame, and produces:
///
/// - `NoteEvent`s for the synthesizer side (OSC sender, logger), via a
///   [`ChannelPlayer`];
/// - `KeyFrame`s for display consumers (render contract + sounding keys).
///
/// # Timing
///
/// Both cadences run off frame timestamps: every frame is a frame tick, and
/// the servo is rescanned on the first frame at or past each servo interval,
/// before that frame's keys are evaluated. All 88 keys of a frame therefore
/// see the same frame and the same offset.
///
/// # Recalibration
///
/// A `Calibrate` event replaces the capture area. The old one is stopped
/// first, so every note it left sounding is released. If the new
/// calibration is rejected there is no capture area until the next valid
/// one, and frames are ignored. Frames reaching a stopped area are ignored
/// the same way and publish no `KeyFrame`.
pub struct Coordinator {
    input_rx: Receiver<InputEvent>,
    frame_txs: Vec<Sender<KeyFrame>>,
    note_txs: Vec<Sender<NoteEvent>>,
    config: DetectorConfig,
    area: Option<CaptureArea<ChannelPlayer>>,
    last_timestamp_us: u64,
    stats: CoordinatorStats,
}

impl Coordinator {
    pub fn new(
        input_rx: Receiver<InputEvent>,
        frame_txs: Vec<Sender<KeyFrame>>,
        note_txs: Vec<Sender<NoteEvent>>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            input_rx,
            frame_txs,
            note_txs,
            config,
            area: None,
            last_timestamp_us: 0,
            stats: CoordinatorStats::default(),
        }
    }

    pub fn run(&mut self) -> CoordinatorStats {
        info!(
            "Coordinator running (frame {}ms, servo {}ms, debounce {} ticks, stop policy {:?})",
            self.config.frame_interval_ms,
            self.config.servo_interval_ms,
            self.config.debounce_ticks,
            self.config.stop_policy,
        );

        while let Ok(event) = self.input_rx.recv() {
            self.handle(event);
        }

        if let Some(area) = self.area.as_mut() {
            area.stop();
        }
        self.stats.notes = self.notes_sent();
        self.area = None;

        info!(
            "Coordinator shutting down after {} frames ({} ignored), {} note calls",
            self.stats.frames, self.stats.ignored_frames, self.stats.notes
        );
        self.stats.clone()
    }

    fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::Frame(frame) => self.on_frame(frame),
            InputEvent::Calibrate { boundaries, row } => self.on_calibrate(&boundaries, row),
            InputEvent::Stop => {
                if let Some(area) = self.area.as_mut() {
                    area.stop();
                } else {
                    debug!("Stop requested with no capture area");
                }
            }
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        self.last_timestamp_us = frame.timestamp_us;
        let Some(area) = self.area.as_mut().filter(|a| a.state() == CaptureState::Active) else {
            self.stats.ignored_frames += 1;
            if self.stats.ignored_frames % 1000 == 1 {
                debug!("No active capture area, ignoring frames ({} so far)", self.stats.ignored_frames);
            }
            return;
        };

        area.player_mut().now_us = frame.timestamp_us;
        area.tick(&frame, frame.timestamp_us);

        if !self.frame_txs.is_empty() {
            let key_frame = area.key_frame(frame.timestamp_us);
            for tx in &self.frame_txs {
                let _ = tx.send(key_frame.clone());
            }
        }

        self.stats.frames += 1;
        if self.stats.frames % 1000 == 0 {
            debug!("Coordinator: {} frames processed", self.stats.frames);
            trace!(
                "Latest: t={}µs offset={} sounding={:?}",
                frame.timestamp_us,
                area.servo().offset(),
                area.sounding()
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &s)| s.then_some(i))
                    .collect::<Vec<_>>()
            );
        }
    }

    fn on_calibrate(&mut self, boundaries: &str, row: i32) {
        // Retire the old area first so its notes are released before any
        // new ones can start.
        if let Some(mut old) = self.area.take() {
            old.stop();
            self.stats.notes += old.player().sent();
        }

        let player = ChannelPlayer::new(self.note_txs.clone());
        match CaptureArea::parse(boundaries, row, &self.config, player, self.last_timestamp_us) {
            Ok(mut area) => {
                area.player_mut().now_us = self.last_timestamp_us;
                self.stats.calibrations += 1;
                self.area = Some(area);
            }
            Err(e) => {
                self.stats.rejected_calibrations += 1;
                error!("Calibration rejected, no keys will be detected: {}", e);
            }
        }
    }

    /// Note calls issued by the current area plus those already retired.
    fn notes_sent(&self) -> u64 {
        self.stats.notes + self.area.as_ref().map_or(0, |a| a.player().sent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::uniform_boundaries;
    use crossbeam_channel::unbounded;

    fn boundaries_text() -> String {
        uniform_boundaries(60, 6)
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn white(ts: u64) -> Frame {
        Frame::filled(ts, 640, 4, BRIGHT)
    }

    #[test]
    fn test_input_channel_holds_few_frames() {
        let (tx, _rx) = input_channel();
        assert_eq!(tx.capacity(), Some(INPUT_QUEUE_DEPTH));
        let config = DetectorConfig::default();
        let frame_bytes = config.frame_width as usize * config.frame_height as usize * CHANNELS;
        assert!(INPUT_QUEUE_DEPTH * frame_bytes < 16 << 20);

        for i in 0..INPUT_QUEUE_DEPTH as u64 {
            tx.try_send(InputEvent::Frame(white(i))).unwrap();
        }
        assert!(tx.try_send(InputEvent::Frame(white(99))).is_err());
    }

    #[test]
    fn test_frames_before_calibration_are_ignored() {
        let (tx, rx) = unbounded();
        let (note_tx, note_rx) = unbounded();
        let mut c = Coordinator::new(rx, vec![], vec![note_tx], DetectorConfig::default());
        tx.send(InputEvent::Frame(Frame::filled(0, 640, 4, BLACK))).unwrap();
        drop(tx);
        let stats = c.run();
        assert_eq!(stats.ignored_frames, 1);
        assert_eq!(stats.frames, 0);
        assert!(note_rx.try_recv().is_err());
    }

    #[test]
    fn test_rejected_calibration_builds_no_area() {
        let (tx, rx) = unbounded();
        let (frame_tx, frame_rx) = unbounded();
        let mut c = Coordinator::new(rx, vec![frame_tx], vec![], DetectorConfig::default());
        tx.send(InputEvent::Calibrate { boundaries: "1 2 3".into(), row: 1 }).unwrap();
        tx.send(InputEvent::Frame(white(0))).unwrap();
        drop(tx);
        let stats = c.run();
        assert_eq!(stats.rejected_calibrations, 1);
        assert_eq!(stats.calibrations, 0);
        assert_eq!(stats.ignored_frames, 1);
        assert!(frame_rx.try_recv().is_err(), "no overlay without a capture area");
    }

    #[test]
    fn test_frames_after_stop_are_ignored() {
        let (tx, rx) = unbounded();
        let (frame_tx, frame_rx) = unbounded();
        let mut c = Coordinator::new(rx, vec![frame_tx], vec![], DetectorConfig::default());
        tx.send(InputEvent::Calibrate { boundaries: boundaries_text(), row: 1 }).unwrap();
        tx.send(InputEvent::Frame(white(0))).unwrap();
        tx.send(InputEvent::Stop).unwrap();
        tx.send(InputEvent::Frame(white(5_000))).unwrap();
        tx.send(InputEvent::Frame(white(10_000))).unwrap();
        drop(tx);
        let stats = c.run();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.ignored_frames, 2);
        assert_eq!(frame_rx.try_iter().count(), 1);
    }

    #[test]
    fn test_key_frames_published_per_frame() {
        let (tx, rx) = unbounded();
        let (frame_tx, frame_rx) = unbounded();
        let mut c = Coordinator::new(rx, vec![frame_tx], vec![], DetectorConfig::default());
        tx.send(InputEvent::Calibrate { boundaries: boundaries_text(), row: 1 }).unwrap();
        for i in 0..3 {
            tx.send(InputEvent::Frame(white(i * 5_000))).unwrap();
        }
        drop(tx);
        let stats = c.run();
        assert_eq!(stats.frames, 3);
        let frames: Vec<KeyFrame> = frame_rx.try_iter().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].timestamp_us, 10_000);
        assert_eq!(frames[0].rects.len(), KEY_COUNT);
        assert_eq!(frames[0].sounding_count(), 0);
    }
}
