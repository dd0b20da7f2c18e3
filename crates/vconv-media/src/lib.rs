//! FFmpeg CLI wrapper for container conversion.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A process runner that captures the stderr tail on failure
//! - The `Transcoder` seam used by the conversion pipeline

pub mod command;
pub mod error;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner, Transcoder};
pub use error::{MediaError, MediaResult};
