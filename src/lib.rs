//! # Dubline DSP
//!
//! Offline compositor for dubbing: places translated speech on the original
//! timeline so every line fits exactly inside the slot the original line
//! occupied, without shifting pitch.
//!
//! ## Features
//!
//! - **Decoding**: raw 16-bit PCM from speech services, any container via Symphonia
//! - **Silence trimming**: strips padding from synthesized speech
//! - **Time stretching**: granular overlap-add, pitch preserving
//! - **Compositing**: sample-accurate slot placement with an optional background bed
//! - **WAV encoding**: canonical 44-byte-header 16-bit PCM
//! - **Preview**: device-clock scheduling for auditioning (rate-shifted, not pitch-preserving)
//!
//! ## Quick Start
//!
//! ```no_run
//! use dubline_dsp::{dub_to_wav, ingest_speech, DubConfig, DubSegment};
//! use dubline_dsp::io::decoder::decode_container;
//!
//! let config = DubConfig::default();
//! let original = decode_container(&std::fs::read("episode.mp4")?)?;
//!
//! let speech_bytes: Vec<u8> = vec![]; // raw PCM from the speech service
//! let segment = DubSegment::new(1, 2.0, 4.0, "Hello there")?
//!     .with_translation("Hola")
//!     .with_audio(ingest_speech(&speech_bytes, &config)?);
//!
//! let wav = dub_to_wav(&original, &[segment], &config)?;
//! std::fs::write("dubbed.wav", wav)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Decoder → SilenceTrimmer (speech only) → Compositor (→ TimeStretch) → WAV encoder
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod io;
pub mod preprocessing;
pub mod preview;
pub mod stretch;
pub mod timeline;

// Re-export main types
pub use config::{DubConfig, SegmentErrorPolicy};
pub use error::{DubError, Result};
pub use io::buffer::AudioBuffer;
pub use io::decoder::{decode_base64_pcm16, decode_container, decode_raw_pcm16, decode_speech};
pub use io::wav::{encode_wav, write_wav};
pub use preprocessing::silence::trim_silence;
pub use stretch::granular::time_stretch;
pub use timeline::compositor::{composite, composite_with_report};
pub use timeline::report::CompositeReport;
pub use timeline::segment::{DubSegment, Timeline};

/// Decode and clean up one synthesized speech payload
///
/// # Arguments
///
/// * `bytes` - Raw PCM or container bytes from the speech service
/// * `config` - Supplies `speech_sample_rate`, `trim_synthesized` and
///   `silence_threshold`
///
/// # Returns
///
/// The decoded speech, with leading and trailing silence removed when
/// `config.trim_synthesized` is set
///
/// # Errors
///
/// Any decoding error. The caller decides whether a failure means "no audio
/// for this segment".
pub fn ingest_speech(bytes: &[u8], config: &DubConfig) -> Result<AudioBuffer> {
    config.validate()?;
    let decoded = decode_speech(bytes, config.speech_sample_rate)?;
    if !config.trim_synthesized {
        return Ok(decoded);
    }
    let trimmed = trim_silence(&decoded, config.silence_threshold);
    log::debug!(
        "Ingested speech: {} frames, {} after trimming",
        decoded.frame_count(),
        trimmed.frame_count()
    );
    Ok(trimmed)
}

/// Composite the timeline and encode the result as WAV bytes
///
/// # Example
///
/// ```
/// use dubline_dsp::{dub_to_wav, AudioBuffer, DubConfig, DubSegment};
///
/// let original = AudioBuffer::silent(24000, 1, 24000)?;
/// let placeholder = DubSegment::new(1, 0.25, 0.75, "line")?;
/// let wav = dub_to_wav(&original, &[placeholder], &DubConfig::default())?;
/// assert_eq!(wav.len(), 44 + 24000 * 2);
/// # Ok::<(), dubline_dsp::DubError>(())
/// ```
pub fn dub_to_wav(
    original: &AudioBuffer,
    segments: &[DubSegment],
    config: &DubConfig,
) -> Result<Vec<u8>> {
    let master = composite(original, segments, config)?;
    encode_wav(&master)
}
