//! Explicit sample rate conversion using rubato
//!
//! Synthesized speech arrives at 24 kHz while the original track may run at
//! 44.1 or 48 kHz. Buffers carry their own rate; when two have to meet in
//! one mix, the segment is converted here, never reinterpreted in place.

use crate::error::{DubError, Result};
use crate::io::buffer::AudioBuffer;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Convert `buffer` to `target_rate`
///
/// Output length is `round(frames * target_rate / source_rate)` and the
/// resampler's delay is removed, so frame `n` of the source lines up with
/// frame `n * target_rate / source_rate` of the result. A buffer already at
/// the target rate is returned unchanged.
///
/// # Errors
///
/// `InvalidInput` for a zero target rate, `Resample` if rubato rejects the
/// conversion.
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if target_rate == 0 {
        return Err(DubError::InvalidInput("Target sample rate must be > 0".to_string()));
    }
    let source_rate = buffer.sample_rate();
    if source_rate == target_rate {
        return Ok(buffer.clone());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let frames = buffer.frame_count();
    let expected = (frames as f64 * ratio).round() as usize;

    if frames == 0 {
        return AudioBuffer::silent(target_rate, buffer.channel_count(), 0);
    }

    log::debug!(
        "Resampling {} frames from {} Hz to {} Hz ({} channels)",
        frames,
        source_rate,
        target_rate,
        buffer.channel_count()
    );

    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0,
        PolynomialDegree::Septic,
        frames,
        buffer.channel_count(),
    )
    .map_err(|e| DubError::Resample(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let mut channels = resampler
        .process(buffer.channels(), None)
        .map_err(|e| DubError::Resample(format!("Resampling failed: {}", e)))?;

    // Flush the filter so the last input frames come out too
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| DubError::Resample(format!("Resampler flush failed: {}", e)))?;

    // Drop the leading delay and pin the length so timing matches the source
    for (channel, rest) in channels.iter_mut().zip(tail) {
        channel.extend(rest);
        channel.drain(..delay.min(channel.len()));
        channel.resize(expected, 0.0);
    }

    AudioBuffer::new(target_rate, channels)
}
