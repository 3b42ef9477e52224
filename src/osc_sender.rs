use crate::frequency::key_for_frequency;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{debug, error, info};
use rosc::{OscMessage, OscPacket, OscType};
use std::net::UdpSocket;

/// Forwards note events to an external synthesizer over OSC.
///
///   /piano/note/start  <f32 hz> <i32 key>
///   /piano/note/stop   <f32 hz> <i32 key>
///
/// `key` is the 0–87 key index, or -1 if the frequency is off the keyboard.
pub struct OscSender {
    rx: Receiver<NoteEvent>,
    target: String,
}

impl OscSender {
    pub fn new(rx: Receiver<NoteEvent>, target: String) -> Self {
        Self { rx, target }
    }

    /// Run the OSC sender loop. Blocks the calling thread.
    pub fn run(&self) {
        let socket = match UdpSocket::bind("0.0.0.0:0") {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to bind UDP socket: {}", e);
                return;
            }
        };
        info!("OSC sender → {}", self.target);

        let mut sent: u64 = 0;
        for event in self.rx.iter() {
            match self.send_note(&socket, &event) {
                Ok(()) => sent += 1,
                Err(e) => debug!("OSC send error: {}", e),
            }
        }
        info!("OSC sender shutting down after {} notes", sent);
    }

    fn send_note(
        &self,
        socket: &UdpSocket,
        event: &NoteEvent,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let buf = rosc::encoder::encode(&note_packet(event))?;
        socket.send_to(&buf, &self.target)?;
        Ok(())
    }
}

pub fn note_packet(event: &NoteEvent) -> OscPacket {
    let addr = match event.kind {
        NoteKind::Start => "/piano/note/start",
        NoteKind::Stop => "/piano/note/stop",
    };
    let key = key_for_frequency(event.frequency).map_or(-1, |k| k as i32);
    OscPacket::Message(OscMessage {
        addr: addr.to_string(),
        args: vec![OscType::Float(event.frequency as f32), OscType::Int(key)],
    })
}
