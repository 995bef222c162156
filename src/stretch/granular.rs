//! Granular overlap-add time stretching
//!
//! Changes duration without changing pitch by re-spacing short grains
//! instead of resampling them.
//!
//! Algorithm:
//! 1. Cut grains of length G from the input every `H_in = floor(H_out * factor)` frames
//! 2. Apply a triangular window to each grain
//! 3. Add grains into the output every `H_out = G / 2` frames
//! 4. Scale the result by a fixed output gain
//!
//! At 50% overlap the triangular windows sum to exactly one, so the only gain
//! correction is the constant attenuation applied at the end. Each grain keeps
//! its spectral content at the original sample rate; only the hop cadence
//! changes, which is why pitch is preserved.
//!
//! # Example
//!
//! ```no_run
//! use dubline_dsp::io::buffer::AudioBuffer;
//! use dubline_dsp::stretch::granular::time_stretch;
//!
//! let speech = AudioBuffer::mono(24000, vec![0.0; 72000])?; // 3.0 s
//! let fitted = time_stretch(&speech, 1.5)?; // 2.0 s
//! assert_eq!(fitted.frame_count(), 48000);
//! # Ok::<(), dubline_dsp::DubError>(())
//! ```

use crate::error::{DubError, Result};
use crate::io::buffer::AudioBuffer;

/// Default grain length in frames
pub const DEFAULT_GRAIN_SIZE: usize = 2048;

/// Default attenuation applied after overlap-add
pub const DEFAULT_STRETCH_GAIN: f32 = 0.9;

/// Parameters for [`time_stretch_with`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchParams {
    /// Grain length G in frames (even, >= 2)
    pub grain_size: usize,

    /// Fixed gain applied to the whole output
    pub output_gain: f32,
}

impl Default for StretchParams {
    fn default() -> Self {
        Self {
            grain_size: DEFAULT_GRAIN_SIZE,
            output_gain: DEFAULT_STRETCH_GAIN,
        }
    }
}

/// Periodic triangular window; two copies offset by `len / 2` sum to one.
pub fn triangular_window(len: usize) -> Vec<f32> {
    let half = len as f32 / 2.0;
    (0..len)
        .map(|i| 1.0 - ((i as f32 - half) / half).abs())
        .collect()
}

/// Stretch with default parameters
///
/// `factor = source_duration / target_duration`: above 1 shortens, below 1
/// lengthens, exactly 1 returns the input unchanged.
pub fn time_stretch(buffer: &AudioBuffer, factor: f64) -> Result<AudioBuffer> {
    time_stretch_with(buffer, factor, &StretchParams::default())
}

/// Stretch `buffer` by `factor` using granular overlap-add
///
/// Only channel 0 is processed; a multichannel input gets the processed
/// channel replicated to every output channel.
///
/// # Arguments
///
/// * `buffer` - Source audio, at least one grain long
/// * `factor` - `source_duration / target_duration`
/// * `params` - Grain size and output gain
///
/// # Returns
///
/// A new buffer of `floor(frames / factor)` frames at the input's sample
/// rate. The input is not modified.
///
/// # Errors
///
/// - `InvalidInput` if `factor` is not finite and positive, or the grain size
///   is odd or below 2
/// - `InputTooShort` if the input holds fewer frames than one grain
/// - `EmptyBuffer` if the target length is shorter than one grain, so no
///   grain could be placed and the result would be silence
pub fn time_stretch_with(
    buffer: &AudioBuffer,
    factor: f64,
    params: &StretchParams,
) -> Result<AudioBuffer> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(DubError::InvalidInput(format!(
            "Stretch factor must be finite and > 0, got {}",
            factor
        )));
    }

    let grain = params.grain_size;
    if grain < 2 || grain % 2 != 0 {
        return Err(DubError::InvalidInput(format!(
            "Grain size must be even and >= 2, got {}",
            grain
        )));
    }

    if factor == 1.0 {
        return Ok(buffer.clone());
    }

    let input = buffer.channel(0);
    let input_len = input.len();
    if input_len < grain {
        return Err(DubError::InputTooShort {
            frames: input_len,
            grain,
        });
    }

    let hop_out = grain / 2;
    let hop_in = (hop_out as f64 * factor).floor() as usize;
    let output_len = (input_len as f64 / factor).floor() as usize;
    if output_len < grain {
        return Err(DubError::EmptyBuffer(format!(
            "Stretching {} frames by {} gives {} frames, shorter than one grain ({})",
            input_len, factor, output_len, grain
        )));
    }

    log::debug!(
        "Time stretch: {} -> {} frames (factor {:.4}, grain {}, hop in/out {}/{})",
        input_len,
        output_len,
        factor,
        grain,
        hop_in,
        hop_out
    );

    let window = triangular_window(grain);
    let mut output = vec![0.0f32; output_len];

    // input_len >= grain and output_len >= grain, so at least one grain lands
    let mut read = 0usize;
    let mut write = 0usize;
    while read + grain <= input_len && write + grain <= output_len {
        let source = &input[read..read + grain];
        for ((out, &x), &w) in output[write..write + grain]
            .iter_mut()
            .zip(source)
            .zip(&window)
        {
            *out += x * w;
        }
        write += hop_out;
        read += hop_in;
    }

    if params.output_gain != 1.0 {
        for s in output.iter_mut() {
            *s *= params.output_gain;
        }
    }

    let channels = vec![output; buffer.channel_count()];
    Ok(AudioBuffer::from_planar(buffer.sample_rate(), channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
                    * amplitude
            })
            .collect()
    }

    fn rising_zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count()
    }

    #[test]
    fn test_window_sums_to_unity_at_half_overlap() {
        let w = triangular_window(16);
        for i in 0..8 {
            assert!((w[i] + w[i + 8] - 1.0).abs() < 1e-6);
        }
        assert_eq!(w[0], 0.0);
        assert_eq!(w[8], 1.0);
    }

    #[test]
    fn test_identity_factor() {
        let buf = AudioBuffer::mono(24000, sine(300.0, 0.5, 24000, 5000)).unwrap();
        let out = time_stretch(&buf, 1.0).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn test_duration_law() {
        let buf = AudioBuffer::mono(24000, sine(220.0, 0.5, 24000, 48000)).unwrap();
        for &factor in &[1.5, 0.75, 2.0, 0.5, 1.3, 1.07] {
            let out = time_stretch(&buf, factor).unwrap();
            let expected = (48000.0 / factor).floor() as i64;
            assert!(
                (out.frame_count() as i64 - expected).abs() <= 1,
                "factor {}: expected {} frames, got {}",
                factor,
                expected,
                out.frame_count()
            );
            assert_eq!(out.sample_rate(), 24000);
        }
    }

    #[test]
    fn test_slot_fit_example() {
        // 3.0 s of speech into a 2.0 s slot
        let buf = AudioBuffer::mono(24000, sine(200.0, 0.4, 24000, 72000)).unwrap();
        let out = time_stretch(&buf, 1.5).unwrap();
        assert_eq!(out.frame_count(), 48000);
    }

    #[test]
    fn test_preserves_pitch() {
        let sample_rate = 24000;
        let buf = AudioBuffer::mono(sample_rate, sine(440.0, 0.8, sample_rate, 72000)).unwrap();
        let out = time_stretch(&buf, 1.5).unwrap();

        // One second from the middle of the output
        let crossings = rising_zero_crossings(&out.channel(0)[12000..36000]);
        assert!(
            (400..=480).contains(&crossings),
            "expected ~440 Hz after stretching, measured {} Hz",
            crossings
        );
    }

    #[test]
    fn test_no_systematic_clipping() {
        let buf = AudioBuffer::mono(24000, sine(180.0, 0.8, 24000, 48000)).unwrap();
        for &factor in &[0.6, 1.4] {
            let out = time_stretch(&buf, factor).unwrap();
            assert!(out.peak() <= 0.8, "factor {} peak {}", factor, out.peak());
        }
    }

    #[test]
    fn test_short_input_fails() {
        let buf = AudioBuffer::mono(24000, vec![0.1; DEFAULT_GRAIN_SIZE - 1]).unwrap();
        let result = time_stretch(&buf, 1.2);
        assert!(matches!(
            result,
            Err(DubError::InputTooShort {
                frames: 2047,
                grain: 2048
            })
        ));
    }

    #[test]
    fn test_input_of_exactly_one_grain() {
        let buf = AudioBuffer::mono(24000, vec![0.5; DEFAULT_GRAIN_SIZE]).unwrap();
        let out = time_stretch(&buf, 0.5).unwrap();
        assert_eq!(out.frame_count(), 4096);
        assert!((out.channel(0)[1024] - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_output_shorter_than_grain_fails() {
        // 0.5 s of speech squeezed into 50 ms would leave no room for a grain
        let buf = AudioBuffer::mono(24000, sine(200.0, 0.5, 24000, 12_000)).unwrap();
        assert!(matches!(
            time_stretch(&buf, 10.0),
            Err(DubError::EmptyBuffer(_))
        ));
    }

    #[test]
    fn test_output_length_around_one_grain() {
        let buf = AudioBuffer::mono(24000, vec![0.5; 4096]).unwrap();

        // 4096 / 2.001 -> 2046 frames
        assert!(matches!(
            time_stretch(&buf, 2.001),
            Err(DubError::EmptyBuffer(_))
        ));

        // exactly one grain
        let out = time_stretch(&buf, 2.0).unwrap();
        assert_eq!(out.frame_count(), 2048);
        assert!((out.channel(0)[1024] - 0.45).abs() < 1e-6);

        // 4096 / 1.999 -> 2049 frames, still a single grain
        let out = time_stretch(&buf, 1.999).unwrap();
        assert_eq!(out.frame_count(), 2049);
        assert!((out.channel(0)[1024] - 0.45).abs() < 1e-6);
        assert!(out.peak() <= 0.45 + 1e-6);
    }

    #[test]
    fn test_invalid_factor() {
        let buf = AudioBuffer::mono(24000, vec![0.1; 4096]).unwrap();
        for &factor in &[0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                time_stretch(&buf, factor),
                Err(DubError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_invalid_grain() {
        let buf = AudioBuffer::mono(24000, vec![0.1; 4096]).unwrap();
        let params = StretchParams {
            grain_size: 1023,
            output_gain: 1.0,
        };
        assert!(time_stretch_with(&buf, 1.2, &params).is_err());
    }

    #[test]
    fn test_stereo_replicates_channel_zero() {
        let left = sine(300.0, 0.5, 24000, 8192);
        let right = vec![0.0; 8192];
        let buf = AudioBuffer::new(24000, vec![left, right]).unwrap();
        let out = time_stretch(&buf, 0.8).unwrap();

        assert_eq!(out.channel_count(), 2);
        assert_eq!(out.channel(0), out.channel(1));
        assert!(out.peak() > 0.1);
    }

    #[test]
    fn test_does_not_mutate_input() {
        let samples = sine(300.0, 0.5, 24000, 8192);
        let buf = AudioBuffer::mono(24000, samples.clone()).unwrap();
        let _ = time_stretch(&buf, 1.7).unwrap();
        assert_eq!(buf.channel(0), samples.as_slice());
    }
}
