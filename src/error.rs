//! Error types for the dubbing compositor

use thiserror::Error;

/// Errors that can occur while decoding, stretching, mixing or encoding audio
#[derive(Debug, Error)]
pub enum DubError {
    /// Malformed byte length or payload (odd PCM length, bad base64)
    #[error("Corrupt audio data: {0}")]
    CorruptAudioData(String),

    /// The generic container decoder could not parse the input
    #[error("Unsupported format: {detail}")]
    UnsupportedFormat {
        /// Error text reported by the container decoder
        detail: String,
    },

    /// Buffer is shorter than one stretch grain
    #[error("Input too short: {frames} frames, need at least {grain}")]
    InputTooShort {
        /// Frames available
        frames: usize,
        /// Grain length required
        grain: usize,
    },

    /// Degenerate zero-frame result where audio is required
    #[error("Empty buffer: {0}")]
    EmptyBuffer(String),

    /// Invalid parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Segment violates its timing invariants
    #[error("Invalid segment {id}: {reason}")]
    InvalidSegment {
        /// Segment id
        id: u32,
        /// What is wrong with it
        reason: String,
    },

    /// Sample rate conversion failed
    #[error("Resampling error: {0}")]
    Resample(String),

    /// Writer failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate result alias
pub type Result<T> = std::result::Result<T, DubError>;
