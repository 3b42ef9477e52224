//! Calibration map: 89 operator-entered pixel boundaries into 88 key spans.
//!
//! Boundary `i` is the left edge of key `i`; boundary 88 is the right edge of
//! the top key. Boundaries are expected to be non-decreasing but this is not
//! enforced: a decreasing pair is logged and produces a non-positive width,
//! which simply samples nothing.

use crate::error::{CaptureError, CaptureResult};
use crate::types::{BOUNDARY_COUNT, KEY_COUNT};
use log::warn;

/// Horizontal sensing span of one key, before servo correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpan {
    pub x: i32,
    pub width: i32,
}

#[derive(Debug, Clone)]
pub struct CalibrationMap {
    spans: Vec<KeySpan>,
}

impl CalibrationMap {
    /// Parse whitespace-delimited operator input.
    pub fn parse(text: &str) -> CaptureResult<Self> {
        let boundaries = text
            .split_whitespace()
            .enumerate()
            .map(|(position, token)| {
                token
                    .parse::<i32>()
                    .map_err(|_| CaptureError::InvalidBoundary {
                        position,
                        token: token.to_string(),
                    })
            })
            .collect::<CaptureResult<Vec<i32>>>()?;
        Self::from_boundaries(&boundaries)
    }

    /// Build from boundary coordinates. Values past the 89th are ignored.
    pub fn from_boundaries(boundaries: &[i32]) -> CaptureResult<Self> {
        if boundaries.len() < BOUNDARY_COUNT {
            return Err(CaptureError::InvalidCalibration {
                found: boundaries.len(),
            });
        }
        if boundaries.len() > BOUNDARY_COUNT {
            warn!(
                "Calibration: {} boundaries supplied, ignoring the last {}",
                boundaries.len(),
                boundaries.len() - BOUNDARY_COUNT
            );
        }

        let spans = boundaries[..BOUNDARY_COUNT]
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let width = pair[1]
                    .checked_sub(pair[0])
                    .ok_or_else(|| CaptureError::InvalidBoundary {
                        position: i + 1,
                        token: pair[1].to_string(),
                    })?;
                Ok(KeySpan { x: pair[0], width })
            })
            .collect::<CaptureResult<Vec<KeySpan>>>()?;

        for (i, span) in spans.iter().enumerate() {
            if span.width < 0 {
                warn!(
                    "Calibration: boundary {} ({}) is left of boundary {} ({})",
                    i + 1,
                    span.x.saturating_add(span.width),
                    i,
                    span.x
                );
            }
        }

        debug_assert_eq!(spans.len(), KEY_COUNT);
        Ok(Self { spans })
    }

    pub fn spans(&self) -> &[KeySpan] {
        &self.spans
    }

    pub fn span(&self, key_index: usize) -> Option<KeySpan> {
        self.spans.get(key_index).copied()
    }

    /// Left edge of the first key.
    pub fn left(&self) -> i32 {
        self.spans[0].x
    }

    /// Right edge of the last key.
    pub fn right(&self) -> i32 {
        let last = self.spans[KEY_COUNT - 1];
        last.x + last.width
    }
}

/// Evenly spaced boundaries: `start, start + step, …` (89 values).
pub fn uniform_boundaries(start: i32, step: i32) -> Vec<i32> {
    (0..BOUNDARY_COUNT as i32).map(|i| start + i * step).collect()
}
