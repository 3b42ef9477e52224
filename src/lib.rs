pub mod cadence;
pub mod calibration;
pub mod capture_area;
pub mod config;
pub mod console_display;
pub mod coordinator;
pub mod data_logger;
pub mod error;
pub mod frame;
pub mod frame_reader;
pub mod frequency;
pub mod motor;
pub mod osc_sender;
pub mod playback;
pub mod segment;
pub mod servo;
pub mod simulator;
pub mod types;
