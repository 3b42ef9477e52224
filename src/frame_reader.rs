//! Recorded frame files: replay captured camera frames through the pipeline.
//!
//! Binary layout (little-endian):
//!
//! | Offset | Size      | Field                         |
//! |--------|-----------|-------------------------------|
//! | 0      | 4         | magic `b"PKF1"`               |
//! | 4      | 4         | width (u32)                   |
//! | 8      | 4         | height (u32)                  |
//! | 12     | 8 + w·h·4 | record: timestamp_us (u64) + RGBA bytes, repeated to EOF |

use crate::error::{CaptureError, CaptureResult};
use crate::frame::Frame;
use crate::types::*;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crossbeam_channel::Sender;
use log::{error, info, warn};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const MAGIC: &[u8; 4] = b"PKF1";

/// Reads frames one at a time from any `Read`.
pub struct FrameFileReader<R: Read> {
    reader: R,
    pub width: u32,
    pub height: u32,
}

impl<R: Read> FrameFileReader<R> {
    /// Read and validate the header.
    pub fn open(mut reader: R) -> CaptureResult<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| CaptureError::FrameFormat(format!("read header: {}", e)))?;
        if &magic != MAGIC {
            return Err(CaptureError::FrameFormat(format!("bad magic: {:?}", magic)));
        }
        let width = reader.read_u32::<LittleEndian>()?;
        let height = reader.read_u32::<LittleEndian>()?;
        if width == 0 || height == 0 {
            return Err(CaptureError::FrameFormat(format!("empty frame size {}×{}", width, height)));
        }
        Ok(Self {
            reader,
            width,
            height,
        })
    }

    /// Next frame, `Ok(None)` at a clean end of file.
    pub fn next_frame(&mut self) -> CaptureResult<Option<Frame>> {
        let timestamp_us = match self.reader.read_u64::<LittleEndian>() {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut data = vec![0u8; self.width as usize * self.height as usize * CHANNELS];
        self.reader.read_exact(&mut data).map_err(|e| {
            CaptureError::FrameFormat(format!("truncated frame at t={}µs: {}", timestamp_us, e))
        })?;
        Frame::from_rgba(timestamp_us, self.width, self.height, data)
            .map(Some)
            .ok_or_else(|| CaptureError::FrameFormat("frame size mismatch".into()))
    }
}

/// Writes frames in the same format. Every frame must match the header size.
pub struct FrameFileWriter {
    writer: BufWriter<Box<dyn Write + Send>>,
    width: u32,
    height: u32,
}

impl FrameFileWriter {
    pub fn create(path: &Path, width: u32, height: u32) -> CaptureResult<Self> {
        let file = File::create(path)?;
        Self::new(Box::new(file), width, height)
    }

    pub fn new(inner: Box<dyn Write + Send>, width: u32, height: u32) -> CaptureResult<Self> {
        let mut writer = BufWriter::new(inner);
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(width)?;
        writer.write_u32::<LittleEndian>(height)?;
        Ok(Self {
            writer,
            width,
            height,
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> CaptureResult<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(CaptureError::FrameFormat(format!(
                "frame is {}×{}, file is {}×{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        self.writer.write_u64::<LittleEndian>(frame.timestamp_us)?;
        self.writer.write_all(frame.as_rgba())?;
        Ok(())
    }

    pub fn flush(&mut self) -> CaptureResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Streams a recorded frame file as InputEvents, paced by the recorded
/// timestamps.
///
/// The recorded frames are assumed to be thresholded already; replay feeds
/// them to the coordinator untouched, except that `clamp` (if set) re-runs
/// the threshold on the sensing row for raw camera dumps.
pub struct FrameReplay {
    path: PathBuf,
    tx: Sender<InputEvent>,
    realtime: bool,
    threshold: Option<(i32, i32, u8)>,
}

impl FrameReplay {
    pub fn new(path: PathBuf, tx: Sender<InputEvent>) -> Self {
        Self {
            path,
            tx,
            realtime: true,
            threshold: None,
        }
    }

    /// Replay as fast as the coordinator consumes.
    pub fn unpaced(mut self) -> Self {
        self.realtime = false;
        self
    }

    /// Threshold `rows` rows from `row` with `clamp` before sending.
    pub fn with_threshold(mut self, row: i32, rows: i32, clamp: u8) -> Self {
        self.threshold = Some((row, rows, clamp));
        self
    }

    pub fn run(&self) -> usize {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to open frame file {:?}: {}", self.path, e);
                return 0;
            }
        };
        let mut reader = match FrameFileReader::open(BufReader::new(file)) {
            Ok(r) => r,
            Err(e) => {
                error!("Not a frame file {:?}: {}", self.path, e);
                return 0;
            }
        };
        info!("Replaying {:?} ({}×{})", self.path, reader.width, reader.height);

        let mut sent = 0;
        let mut last_ts: Option<u64> = None;
        loop {
            let mut frame = match reader.next_frame() {
                Ok(Some(f)) => f,
                Ok(None) => break,
                Err(e) => {
                    warn!("Replay stopped after {} frames: {}", sent, e);
                    break;
                }
            };

            if let Some((row, rows, clamp)) = self.threshold {
                frame.binarize_rows(row, rows, clamp);
            }

            if self.realtime {
                if let Some(prev) = last_ts {
                    let gap = frame.timestamp_us.saturating_sub(prev);
                    thread::sleep(Duration::from_micros(gap));
                }
            }
            last_ts = Some(frame.timestamp_us);

            if self.tx.send(InputEvent::Frame(frame)).is_err() {
                break;
            }
            sent += 1;
        }

        info!("Replay complete: {} frames", sent);
        sent
    }
}
