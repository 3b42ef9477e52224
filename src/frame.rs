//! Frames and the pixel-sampling seam.
//!
//! The detector never touches a camera. It asks a [`FrameSampler`] for the
//! channel samples inside a rectangle, the same way a canvas hands back
//! `getImageData`: RGBA, row-major, one byte per channel.

use crate::types::{Rect, BLACK, BRIGHT, CHANNELS};

/// Source of pixel samples for the current frame.
pub trait FrameSampler {
    /// RGBA channel samples of every in-frame pixel of `rect`, row-major.
    /// Pixels outside the frame are skipped.
    fn sample(&self, rect: Rect) -> Vec<u8>;
}

/// An owned RGBA frame with a capture timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Microseconds since session start
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// A frame with every channel set to `value` (alpha is always opaque).
    pub fn filled(timestamp_us: u64, width: u32, height: u32, value: u8) -> Self {
        let mut frame = Self {
            timestamp_us,
            width,
            height,
            data: vec![value; width as usize * height as usize * CHANNELS],
        };
        frame.fill_rect(Rect::new(0, 0, width as i32, height as i32), value);
        frame
    }

    /// Wrap raw RGBA bytes. Returns None if the length doesn't match.
    pub fn from_rgba(timestamp_us: u64, width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * CHANNELS {
            return None;
        }
        Some(Self {
            timestamp_us,
            width,
            height,
            data,
        })
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// Clip a rectangle to the frame. Returns (x0, y0, x1, y1), exclusive ends.
    fn clip(&self, rect: Rect) -> Option<(usize, usize, usize, usize)> {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = rect.right().min(self.width as i32);
        let y1 = rect.bottom().min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as usize, y0 as usize, x1 as usize, y1 as usize))
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        (y * self.width as usize + x) * CHANNELS
    }

    /// Paint an opaque gray level over a rectangle (clipped).
    pub fn fill_rect(&mut self, rect: Rect, value: u8) {
        if let Some((x0, y0, x1, y1)) = self.clip(rect) {
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = self.offset(x, y);
                    self.data[i..i + 3].fill(value);
                    self.data[i + 3] = BRIGHT;
                }
            }
        }
    }

    /// Threshold every channel of `rows` rows starting at `y` to black or
    /// bright: values below `clamp` become 0, the rest 255.
    pub fn binarize_rows(&mut self, y: i32, rows: i32, clamp: u8) {
        if let Some((_, y0, _, y1)) = self.clip(Rect::new(0, y, self.width as i32, rows)) {
            let start = self.offset(0, y0);
            let end = self.offset(0, y1);
            for v in &mut self.data[start..end] {
                *v = if *v < clamp { BLACK } else { BRIGHT };
            }
        }
    }

    /// Red channel at a pixel, None outside the frame.
    pub fn red_at(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(self.data[self.offset(x as usize, y as usize)])
    }
}

impl FrameSampler for Frame {
    fn sample(&self, rect: Rect) -> Vec<u8> {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity((x1 - x0) * (y1 - y0) * CHANNELS);
        for y in y0..y1 {
            let start = self.offset(x0, y);
            let end = self.offset(x1, y);
            out.extend_from_slice(&self.data[start..end]);
        }
        out
    }
}
