//! Detector configuration: every tunable constant of the capture pipeline.
//!
//! All fields default to the nominal values, so a config file only needs the
//! keys it wants to change.

use crate::error::{CaptureError, CaptureResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How `note_stop` is issued once a key's debounce counter runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Once per sounding → silent transition.
    #[default]
    Edge,
    /// On every tick the counter is non-positive, sounding or not.
    EveryTick,
}

/// Where the servo strip sits and where its bright edge should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// Left edge of the scanned strip
    pub x: i32,
    /// Strip width in pixels
    pub width: i32,
    /// Strip-relative index where the bright edge sits with no drift
    pub perfect: i32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            x: 0,
            width: 50,
            perfect: 13,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Frame cadence (ms)
    pub frame_interval_ms: u64,
    /// Servo refresh cadence (ms)
    pub servo_interval_ms: u64,
    /// Monostable hold, in frame ticks
    pub debounce_ticks: i32,
    /// A key is pressed when more black channel samples than this are seen
    pub min_black_pixels: usize,
    /// Rows per sensing rectangle
    pub segment_height: i32,
    pub servo: ServoConfig,
    pub stop_policy: StopPolicy,
    /// Binarization threshold of the front-end filter (simulator / replay)
    pub clamp: u8,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 5,
            servo_interval_ms: 1000,
            debounce_ticks: 10,
            min_black_pixels: 0,
            segment_height: 1,
            servo: ServoConfig::default(),
            stop_policy: StopPolicy::Edge,
            clamp: 128,
            frame_width: 640,
            frame_height: 480,
        }
    }
}

impl DetectorConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> CaptureResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        info!("Loaded detector config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.frame_interval_ms == 0 {
            return Err(CaptureError::Config("frame_interval_ms must be > 0".into()));
        }
        if self.servo_interval_ms == 0 {
            return Err(CaptureError::Config("servo_interval_ms must be > 0".into()));
        }
        if self.debounce_ticks <= 0 {
            return Err(CaptureError::Config("debounce_ticks must be > 0".into()));
        }
        if self.segment_height <= 0 {
            return Err(CaptureError::Config("segment_height must be > 0".into()));
        }
        if self.servo.width <= 0 {
            return Err(CaptureError::Config("servo.width must be > 0".into()));
        }
        Ok(())
    }

    pub fn frame_interval_us(&self) -> u64 {
        self.frame_interval_ms * 1000
    }

    pub fn servo_interval_us(&self) -> u64 {
        self.servo_interval_ms * 1000
    }
}
