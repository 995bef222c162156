//! Channel layout conforming
//!
//! Segments are mixed into a master buffer whose channel count comes from
//! the original track. Synthesized speech is mono, so it has to be spread
//! across however many channels the master has.

use crate::error::{DubError, Result};
use crate::io::buffer::AudioBuffer;

/// Average all channels into one
pub fn downmix_to_mono(buffer: &AudioBuffer) -> AudioBuffer {
    if buffer.channel_count() == 1 {
        return buffer.clone();
    }
    let scale = 1.0 / buffer.channel_count() as f32;
    let mono = (0..buffer.frame_count())
        .map(|i| buffer.channels().iter().map(|c| c[i]).sum::<f32>() * scale)
        .collect();
    AudioBuffer::from_planar(buffer.sample_rate(), vec![mono])
}

/// Replicate one channel of `buffer` into `count` identical channels
pub fn replicate_channel(buffer: &AudioBuffer, source: usize, count: usize) -> Result<AudioBuffer> {
    if count == 0 {
        return Err(DubError::InvalidInput("Channel count must be > 0".to_string()));
    }
    if source >= buffer.channel_count() {
        return Err(DubError::InvalidInput(format!(
            "Channel {} out of range for {}-channel buffer",
            source,
            buffer.channel_count()
        )));
    }
    let channel = buffer.channel(source).to_vec();
    Ok(AudioBuffer::from_planar(
        buffer.sample_rate(),
        vec![channel; count],
    ))
}

/// Return a buffer with exactly `count` channels
///
/// - same count: unchanged
/// - mono input: replicated
/// - mono output: averaged
/// - otherwise: output channel `c` takes input channel `min(c, n - 1)`
pub fn conform_channels(buffer: &AudioBuffer, count: usize) -> Result<AudioBuffer> {
    let have = buffer.channel_count();
    if count == 0 {
        return Err(DubError::InvalidInput("Channel count must be > 0".to_string()));
    }
    if have == count {
        return Ok(buffer.clone());
    }

    log::debug!("Conforming {} channels to {}", have, count);

    if have == 1 {
        return replicate_channel(buffer, 0, count);
    }
    if count == 1 {
        return Ok(downmix_to_mono(buffer));
    }
    let channels = (0..count)
        .map(|c| buffer.channel(c.min(have - 1)).to_vec())
        .collect();
    Ok(AudioBuffer::from_planar(buffer.sample_rate(), channels))
}
