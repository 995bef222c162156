//! Audio decoding
//!
//! Two entry points:
//! - [`decode_raw_pcm16`]: headerless little-endian signed 16-bit mono PCM,
//!   the format speech synthesis services hand back
//! - [`decode_container`]: any container/codec Symphonia can probe
//!   (WAV, MP3, AAC/MP4, FLAC, Ogg Vorbis)
//!
//! [`decode_speech`] combines both for payloads of uncertain origin.

use crate::error::{DubError, Result};
use crate::io::buffer::AudioBuffer;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::io::Cursor;
use symphonia::core::audio::{AudioBuffer as SymphoniaBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Full-scale divisor for signed 16-bit PCM
const PCM16_SCALE: f32 = 32768.0;

/// Decode headerless 16-bit little-endian mono PCM
///
/// Each sample `s` maps to `s / 32768.0`.
///
/// # Errors
///
/// - `InvalidInput` if `sample_rate` is zero
/// - `EmptyBuffer` if `bytes` is empty
/// - `CorruptAudioData` if the byte length is odd
pub fn decode_raw_pcm16(bytes: &[u8], sample_rate: u32) -> Result<AudioBuffer> {
    if sample_rate == 0 {
        return Err(DubError::InvalidInput("Sample rate must be > 0".to_string()));
    }
    if bytes.is_empty() {
        return Err(DubError::EmptyBuffer("PCM payload has no bytes".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(DubError::CorruptAudioData(format!(
            "16-bit PCM payload has odd length {}",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect();

    log::debug!(
        "Decoded {} raw PCM16 frames at {} Hz",
        samples.len(),
        sample_rate
    );
    AudioBuffer::mono(sample_rate, samples)
}

/// Decode base64 text carrying 16-bit PCM, as delivered by speech services
///
/// # Errors
///
/// `CorruptAudioData` if the text is not valid standard base64, otherwise
/// whatever [`decode_raw_pcm16`] reports.
pub fn decode_base64_pcm16(encoded: &str, sample_rate: u32) -> Result<AudioBuffer> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| DubError::CorruptAudioData(format!("Invalid base64 audio: {}", e)))?;
    decode_raw_pcm16(&bytes, sample_rate)
}

fn unsupported(err: impl std::fmt::Display) -> DubError {
    DubError::UnsupportedFormat {
        detail: err.to_string(),
    }
}

fn push_channels<S: Sample>(
    buf: &SymphoniaBuffer<S>,
    planar: &mut [Vec<f32>],
    to_f32: impl Fn(S) -> f32,
) {
    for (ch, out) in planar.iter_mut().enumerate() {
        out.extend(buf.chan(ch).iter().map(|&s| to_f32(s)));
    }
}

/// Append one decoded packet, channel by channel, converted to f32
fn append_planar(decoded: &AudioBufferRef<'_>, planar: &mut [Vec<f32>]) -> Result<()> {
    match decoded {
        AudioBufferRef::F32(buf) => push_channels(&**buf, planar, |s| s),
        AudioBufferRef::F64(buf) => push_channels(&**buf, planar, |s| s as f32),
        AudioBufferRef::S16(buf) => push_channels(&**buf, planar, |s| s as f32 / 32768.0),
        AudioBufferRef::S24(buf) => {
            push_channels(&**buf, planar, |s| s.inner() as f32 / 8_388_608.0)
        }
        AudioBufferRef::S32(buf) => {
            push_channels(&**buf, planar, |s| s as f32 / 2_147_483_648.0)
        }
        AudioBufferRef::U8(buf) => {
            push_channels(&**buf, planar, |s| (s as f32 - 128.0) / 128.0)
        }
        _ => return Err(unsupported("unsupported sample format")),
    }
    Ok(())
}

/// Decode a compressed or container format with Symphonia
///
/// Packets that fail with a recoverable decode error are skipped.
///
/// # Arguments
///
/// * `bytes` - Complete file contents (WAV, MP3, AAC/MP4, FLAC, Ogg)
///
/// # Returns
///
/// The first audio track as a planar buffer at its native channel count
/// and sample rate
///
/// # Errors
///
/// - `UnsupportedFormat` if probing, codec setup or demuxing fails
/// - `EmptyBuffer` if no frame could be decoded
pub fn decode_container(bytes: &[u8]) -> Result<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(unsupported)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| unsupported("no decodable audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(unsupported)?;

    let mut planar: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(unsupported(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count();
                if channels == 0 {
                    continue;
                }
                if planar.is_empty() {
                    planar = vec![Vec::new(); channels];
                    sample_rate.get_or_insert(spec.rate);
                } else if planar.len() != channels {
                    log::warn!(
                        "Channel layout changed mid-stream ({} -> {}), skipping packet",
                        planar.len(),
                        channels
                    );
                    continue;
                }

                append_planar(&decoded, &mut planar)?;
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(unsupported(e)),
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| unsupported("stream has no sample rate"))?;
    if planar.is_empty() || planar[0].is_empty() {
        return Err(DubError::EmptyBuffer(
            "Container held no decodable audio frames".to_string(),
        ));
    }

    log::debug!(
        "Decoded container: {} frames, {} channels at {} Hz",
        planar[0].len(),
        planar.len(),
        sample_rate
    );
    AudioBuffer::new(sample_rate, planar)
}

/// True if `bytes` start with the signature of a container Symphonia handles
pub fn looks_like_container(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    let riff_wave = bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE";
    let iso_bmff = bytes.len() >= 8 && &bytes[4..8] == b"ftyp";
    let mpeg_sync = bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0;

    riff_wave
        || iso_bmff
        || mpeg_sync
        || &bytes[0..3] == b"ID3"
        || &bytes[0..4] == b"fLaC"
        || &bytes[0..4] == b"OggS"
}

/// Decode synthesized speech of uncertain origin
///
/// Raw PCM is tried first. Payloads carrying a container signature go to
/// the container decoder first and fall back to raw PCM if that fails, which
/// covers raw PCM that happens to open with sync-like bytes.
///
/// # Arguments
///
/// * `bytes` - Payload from the speech service
/// * `sample_rate` - Rate to assume if the payload is raw PCM
///
/// # Returns
///
/// Mono buffer at `sample_rate` for raw PCM, or the container's native layout
pub fn decode_speech(bytes: &[u8], sample_rate: u32) -> Result<AudioBuffer> {
    if looks_like_container(bytes) {
        return match decode_container(bytes) {
            Ok(buffer) => Ok(buffer),
            Err(container_err) => {
                log::debug!(
                    "Container signature found but decoding failed ({}), trying raw PCM",
                    container_err
                );
                decode_raw_pcm16(bytes, sample_rate).map_err(|_| container_err)
            }
        };
    }

    match decode_raw_pcm16(bytes, sample_rate) {
        Ok(buffer) => Ok(buffer),
        Err(DubError::CorruptAudioData(reason)) => {
            log::debug!("Raw PCM rejected ({}), trying container decoder", reason);
            decode_container(bytes)
        }
        Err(e) => Err(e),
    }
}
