//! Canonical 16-bit PCM WAV encoding
//!
//! Layout: 44-byte RIFF header (`RIFF`, `WAVE`, 16-byte `fmt ` chunk with
//! format tag 1, `data` chunk) followed by interleaved little-endian `i16`
//! samples. Samples are clamped to [-1, 1] and scaled asymmetrically
//! (negative × 32768, non-negative × 32767) so both ends of the `i16` range
//! are reachable.

use crate::error::{DubError, Result};
use crate::io::buffer::AudioBuffer;
use std::io::Write;

/// Size of the canonical RIFF/WAVE header
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: usize = 2;
const FORMAT_PCM: u16 = 1;

/// Convert one float sample to 16-bit PCM
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

fn data_len(buffer: &AudioBuffer) -> Result<u32> {
    let bytes = buffer
        .frame_count()
        .checked_mul(buffer.channel_count() * BYTES_PER_SAMPLE)
        .filter(|&n| n <= (u32::MAX as usize) - 36)
        .ok_or_else(|| {
            DubError::InvalidInput(format!(
                "{} frames x {} channels exceeds the 4 GiB WAV limit",
                buffer.frame_count(),
                buffer.channel_count()
            ))
        })?;
    Ok(bytes as u32)
}

fn header(buffer: &AudioBuffer, data_size: u32) -> Result<[u8; WAV_HEADER_LEN]> {
    let channels = u16::try_from(buffer.channel_count()).map_err(|_| {
        DubError::InvalidInput(format!(
            "{} channels do not fit a WAV header",
            buffer.channel_count()
        ))
    })?;
    let block_align = channels * BYTES_PER_SAMPLE as u16;
    let byte_rate = buffer
        .sample_rate()
        .checked_mul(block_align as u32)
        .ok_or_else(|| DubError::InvalidInput("Byte rate overflows u32".to_string()))?;

    let mut h = [0u8; WAV_HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    h[22..24].copy_from_slice(&channels.to_le_bytes());
    h[24..28].copy_from_slice(&buffer.sample_rate().to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&block_align.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_size.to_le_bytes());
    Ok(h)
}

/// Encode a buffer as a 16-bit PCM WAV file in memory
///
/// The result is exactly `44 + frames * channels * 2` bytes.
///
/// # Errors
///
/// `InvalidInput` if the data would overflow the 32-bit RIFF size fields.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let data_size = data_len(buffer)?;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);
    out.extend_from_slice(&header(buffer, data_size)?);

    let channels = buffer.channels();
    for frame in 0..buffer.frame_count() {
        for channel in channels {
            out.extend_from_slice(&sample_to_i16(channel[frame]).to_le_bytes());
        }
    }

    log::debug!(
        "Encoded WAV: {} frames, {} channels, {} bytes",
        buffer.frame_count(),
        buffer.channel_count(),
        out.len()
    );
    Ok(out)
}

/// Stream a buffer as WAV into any writer
///
/// Same bytes as [`encode_wav`], written frame by frame without building the
/// whole file in memory.
pub fn write_wav<W: Write>(buffer: &AudioBuffer, mut writer: W) -> Result<()> {
    let data_size = data_len(buffer)?;
    writer.write_all(&header(buffer, data_size)?)?;

    let channels = buffer.channels();
    let mut frame_bytes = Vec::with_capacity(channels.len() * BYTES_PER_SAMPLE);
    for frame in 0..buffer.frame_count() {
        frame_bytes.clear();
        for channel in channels {
            frame_bytes.extend_from_slice(&sample_to_i16(channel[frame]).to_le_bytes());
        }
        writer.write_all(&frame_bytes)?;
    }
    writer.flush()?;
    Ok(())
}
