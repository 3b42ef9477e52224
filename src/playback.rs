//! The note-playback seam and its adapters.

use crate::types::{NoteEvent, NoteKind};
use crossbeam_channel::Sender;

/// Receiver of note transitions. The synthesizer behind it is external.
pub trait NotePlayer {
    fn note_start(&mut self, frequency: f64);
    fn note_stop(&mut self, frequency: f64);
}

/// Records every call, in order. Used by tests and offline runs.
#[derive(Debug, Default, Clone)]
pub struct NoteRecorder {
    pub events: Vec<NoteEvent>,
    /// Stamped onto recorded events
    pub now_us: u64,
}

impl NoteRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter().filter(|e| e.kind == NoteKind::Start)
    }

    pub fn stops(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter().filter(|e| e.kind == NoteKind::Stop)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn push(&mut self, kind: NoteKind, frequency: f64) {
        self.events.push(NoteEvent {
            timestamp_us: self.now_us,
            kind,
            frequency,
        });
    }
}

impl NotePlayer for NoteRecorder {
    fn note_start(&mut self, frequency: f64) {
        self.push(NoteKind::Start, frequency);
    }

    fn note_stop(&mut self, frequency: f64) {
        self.push(NoteKind::Stop, frequency);
    }
}

/// Fans note events out to consumer threads (OSC sender, logger, …).
///
/// Consumers that have gone away are ignored; a dead logger must not stop
/// notes reaching the synthesizer.
pub struct ChannelPlayer {
    txs: Vec<Sender<NoteEvent>>,
    /// Timestamp of the frame being evaluated, set by the coordinator
    pub now_us: u64,
    sent: u64,
}

impl ChannelPlayer {
    pub fn new(txs: Vec<Sender<NoteEvent>>) -> Self {
        Self {
            txs,
            now_us: 0,
            sent: 0,
        }
    }

    /// Events emitted so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn send(&mut self, kind: NoteKind, frequency: f64) {
        let event = NoteEvent {
            timestamp_us: self.now_us,
            kind,
            frequency,
        };
        for tx in &self.txs {
            let _ = tx.send(event);
        }
        self.sent += 1;
    }
}

impl NotePlayer for ChannelPlayer {
    fn note_start(&mut self, frequency: f64) {
        self.send(NoteKind::Start, frequency);
    }

    fn note_stop(&mut self, frequency: f64) {
        self.send(NoteKind::Stop, frequency);
    }
}
