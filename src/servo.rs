use crate::config::ServoConfig;
use crate::frame::FrameSampler;
use crate::types::{Rect, BRIGHT, CHANNELS};
use log::{debug, trace, warn};

/// Tracks horizontal drift of the sensor carriage.
///
/// A bright marker rides with the servo. Each refresh scans a one-row strip
/// left to right for the first pixel whose red channel is fully bright; its
/// distance from the `perfect` index is the offset every key span is
/// shifted by.
///
/// # Signal loss
///
/// If the whole strip is dark the marker is out of view. The offset is then
/// set to `perfect` itself and detection carries on; the loss is reported
/// through [`ServoTracker::signal_lost`] and a warning, never as an error.
pub struct ServoTracker {
    strip: Rect,
    perfect: i32,
    offset: i32,
    signal_lost: bool,
}

impl ServoTracker {
    pub fn new(config: ServoConfig, row: i32) -> Self {
        Self {
            strip: Rect::new(config.x, row, config.width, 1),
            perfect: config.perfect,
            offset: 0,
            signal_lost: false,
        }
    }

    /// Rescan the strip and update the offset.
    pub fn refresh(&mut self, sampler: &dyn FrameSampler) -> i32 {
        // Sampling drops pixels left of the frame; positions count from there.
        let clipped = self.strip.x.min(0).unsigned_abs() as usize;
        let pixels = sampler.sample(self.strip);
        let edge = pixels
            .chunks_exact(CHANNELS)
            .position(|px| px[0] == BRIGHT)
            .map(|i| i + clipped);

        let previous = self.offset;
        match edge {
            Some(edge) => {
                self.offset = edge as i32 - self.perfect;
                if self.signal_lost {
                    debug!("servo: signal regained at edge {}", edge);
                }
                self.signal_lost = false;
                trace!("servo: edge={} perfect={} offset={}", edge, self.perfect, self.offset);
            }
            None => {
                self.offset = self.perfect;
                if !self.signal_lost {
                    warn!("servo: no bright pixel in strip {}, falling back to offset {}", self.strip, self.perfect);
                }
                self.signal_lost = true;
            }
        }

        if self.offset != previous {
            debug!("servo: offset {} → {}", previous, self.offset);
        }
        self.offset
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn perfect(&self) -> i32 {
        self.perfect
    }

    pub fn strip(&self) -> Rect {
        self.strip
    }

    /// True when the last refresh found no bright pixel.
    pub fn signal_lost(&self) -> bool {
        self.signal_lost
    }
}
