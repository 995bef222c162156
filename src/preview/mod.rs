//! Real-time preview
//!
//! A lower-fidelity playback path for auditioning a dub before export.

pub mod scheduler;

pub use scheduler::{PlaybackScheduler, PreviewOutput, VoiceRequest};
