//! Audio I/O modules
//!
//! The canonical buffer type, decoding (raw PCM and Symphonia containers)
//! and WAV encoding.

pub mod buffer;
pub mod decoder;
pub mod wav;
