use crate::config::DetectorConfig;
use crate::frequency::{key_for_frequency, note_name};
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{error, info};
use serde_json::json;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes a session directory:
///
/// - `manifest.json`: detector config and the calibration in use
/// - `notes.jsonl`: one line per note call
/// - `stats.json`: totals, written on shutdown
pub struct DataLogger {
    rx: Receiver<NoteEvent>,
    session_dir: PathBuf,
    config: DetectorConfig,
    calibration: String,
}

impl DataLogger {
    pub fn new(
        rx: Receiver<NoteEvent>,
        output_dir: &Path,
        config: DetectorConfig,
        calibration: String,
    ) -> io::Result<Self> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let session_dir = output_dir.join(format!("session_{}", timestamp));
        fs::create_dir_all(&session_dir)?;

        Ok(Self {
            rx,
            session_dir,
            config,
            calibration,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Run the logger. Blocks the calling thread.
    pub fn run(&self) {
        info!("Data logger → {:?}", self.session_dir);
        if let Err(e) = self.write_manifest() {
            error!("Failed to write manifest: {}", e);
        }

        let notes_path = self.session_dir.join("notes.jsonl");
        let file = match File::create(&notes_path) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to create {:?}: {}", notes_path, e);
                return;
            }
        };
        let mut writer = BufWriter::new(file);

        let mut starts: u64 = 0;
        let mut stops: u64 = 0;
        for event in self.rx.iter() {
            match event.kind {
                NoteKind::Start => starts += 1,
                NoteKind::Stop => stops += 1,
            }
            let _ = writeln!(writer, "{}", note_line(&event));
            if (starts + stops) % 100 == 0 {
                let _ = writer.flush();
            }
        }
        let _ = writer.flush();

        let stats = json!({
            "note_starts": starts,
            "note_stops": stops,
        });
        let stats_path = self.session_dir.join("stats.json");
        if let Err(e) = write_json(&stats_path, &stats) {
            error!("Failed to write stats: {}", e);
        }

        info!(
            "Session saved: {} starts, {} stops → {:?}",
            starts, stops, self.session_dir
        );
    }

    fn write_manifest(&self) -> io::Result<()> {
        let boundaries: Vec<&str> = self.calibration.split_whitespace().collect();
        let manifest = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "system": "key-capture",
            "detector": self.config,
            "calibration": {
                "boundaries": boundaries,
                "count": boundaries.len(),
            },
        });
        write_json(&self.session_dir.join("manifest.json"), &manifest)
    }
}

/// One JSONL record. Key index and name are derived from the frequency.
pub fn note_line(event: &NoteEvent) -> serde_json::Value {
    let key = key_for_frequency(event.frequency);
    json!({
        "t": event.timestamp_us,
        "kind": event.kind,
        "hz": event.frequency,
        "key": key,
        "name": key.map(note_name),
    })
}

fn write_json(path: &Path, value: &serde_json::Value) -> io::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    fs::write(path, text)
}
