use crate::frequency::{is_black_key, note_name};
use crate::types::*;
use crossbeam_channel::Receiver;
use std::io::{self, Write};

/// Renders a live ASCII view of the capture area: one cell per key,
/// sounding keys filled, plus the servo state.
pub struct ConsoleDisplay {
    rx: Receiver<KeyFrame>,
    update_hz: u32,
    frame_interval_ms: u64,
}

impl ConsoleDisplay {
    pub fn new(rx: Receiver<KeyFrame>, update_hz: u32, frame_interval_ms: u64) -> Self {
        Self {
            rx,
            update_hz,
            frame_interval_ms,
        }
    }

    pub fn run(&self) {
        let frames_per_sec = (1000 / self.frame_interval_ms.max(1)).max(1);
        let skip = if self.update_hz == 0 {
            frames_per_sec
        } else {
            (frames_per_sec / self.update_hz as u64).max(1)
        };
        let mut count: u64 = 0;
        let mut stdout = io::stdout();

        for frame in self.rx.iter() {
            count += 1;
            if count % skip != 0 {
                continue;
            }

            // Clear screen and move cursor home
            print!("\x1b[2J\x1b[H");
            println!("╔══════════════════════════════════════════════════════════════════════════════════════════╗");
            println!("║  KEY CAPTURE: Live Monitor                                                               ║");
            println!("╠══════════════════════════════════════════════════════════════════════════════════════════╣");
            println!("║  Time: {:.2}s", frame.timestamp_us as f64 / 1_000_000.0);
            println!("║");
            println!("║  {}", key_strip(&frame.sounding));
            println!("║  {}", octave_ruler(frame.sounding.len()));
            println!("║");

            let names: Vec<String> = frame
                .sounding
                .iter()
                .enumerate()
                .filter_map(|(i, &s)| s.then(|| note_name(i)))
                .collect();
            if names.is_empty() {
                println!("║  Sounding: ---");
            } else {
                println!("║  Sounding: {}", names.join(" "));
            }

            let servo = if frame.servo_signal { "ok" } else { "LOST" };
            println!("║  Servo offset: {:+} px (signal {})", frame.servo_offset, servo);
            if let (Some(first), Some(last)) = (frame.rects.first(), frame.rects.last()) {
                println!("║  Sensing row y={}  x={}..{}", first.y, first.x, last.right());
            }
            println!("╚══════════════════════════════════════════════════════════════════════════════════════════╝");
            let _ = stdout.flush();
        }
    }
}

/// One character per key: `█` sounding, `▄` black key at rest, `·` white key at rest.
pub fn key_strip(sounding: &[bool]) -> String {
    sounding
        .iter()
        .enumerate()
        .map(|(i, &s)| match (s, is_black_key(i)) {
            (true, _) => '█',
            (false, true) => '▄',
            (false, false) => '·',
        })
        .collect()
}

/// Marks each C under the key strip with its octave number.
fn octave_ruler(keys: usize) -> String {
    (0..keys)
        .map(|i| {
            let name = note_name(i);
            if name.starts_with('C') && !name.contains('#') {
                name.chars().last().unwrap_or(' ')
            } else {
                ' '
            }
        })
        .collect()
}
