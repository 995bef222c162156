//! Canonical in-memory audio buffer
//!
//! Planar `f32` samples, one `Vec` per channel, all of the same length.
//! Buffers are values: every transform in this crate returns a new buffer
//! and never edits its input.

use crate::error::{DubError, Result};
use std::ops::Range;

/// Decoded audio, planar layout
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a buffer from planar channel data
    ///
    /// # Errors
    ///
    /// Returns `DubError::InvalidInput` if the sample rate is zero, no channel
    /// is given, or the channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(DubError::InvalidInput("Sample rate must be > 0".to_string()));
        }
        if channels.is_empty() {
            return Err(DubError::InvalidInput(
                "Buffer needs at least one channel".to_string(),
            ));
        }
        let frames = channels[0].len();
        if let Some(bad) = channels.iter().position(|c| c.len() != frames) {
            return Err(DubError::InvalidInput(format!(
                "Channel {} has {} frames, expected {}",
                bad,
                channels[bad].len(),
                frames
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Create a single-channel buffer
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Result<Self> {
        Self::new(sample_rate, vec![samples])
    }

    /// Create a zero-filled buffer
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Result<Self> {
        Self::new(sample_rate, vec![vec![0.0; frames]; channel_count])
    }

    /// Internal constructor for callers that already hold the invariants.
    pub(crate) fn from_planar(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        debug_assert!(sample_rate > 0);
        debug_assert!(!channels.is_empty());
        debug_assert!(channels.iter().all(|c| c.len() == channels[0].len()));
        Self {
            sample_rate,
            channels,
        }
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// True if the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration in seconds, always derived from frame count and rate
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    ///
    /// # Panics
    ///
    /// Panics if `index >= channel_count()`.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// All channels, planar
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Consume the buffer and return its planar data
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Copy a frame range across all channels into a new buffer
    ///
    /// The range is clamped to the buffer length.
    pub fn slice_frames(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.frame_count());
        let start = range.start.min(end);
        let channels = self
            .channels
            .iter()
            .map(|c| c[start..end].to_vec())
            .collect();
        Self::from_planar(self.sample_rate, channels)
    }

    /// Largest absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_is_derived() {
        let buf = AudioBuffer::mono(24000, vec![0.0; 36000]).unwrap();
        assert_eq!(buf.frame_count(), 36000);
        assert!((buf.duration_seconds() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_ragged_channels() {
        let result = AudioBuffer::new(44100, vec![vec![0.0; 10], vec![0.0; 9]]);
        assert!(matches!(result, Err(DubError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_zero_rate_and_no_channels() {
        assert!(AudioBuffer::mono(0, vec![0.0]).is_err());
        assert!(AudioBuffer::new(44100, vec![]).is_err());
    }

    #[test]
    fn test_zero_frames_is_legal() {
        let buf = AudioBuffer::silent(48000, 2, 0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.duration_seconds(), 0.0);
    }

    #[test]
    fn test_slice_frames_clamps() {
        let buf = AudioBuffer::new(8000, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let sliced = buf.slice_frames(1..10);
        assert_eq!(sliced.channel(0), &[2.0, 3.0]);
        assert_eq!(sliced.channel(1), &[5.0, 6.0]);
        assert_eq!(sliced.sample_rate(), 8000);

        let inverted = buf.slice_frames(Range { start: 5, end: 2 });
        assert!(inverted.is_empty());
    }

    #[test]
    fn test_peak() {
        let buf = AudioBuffer::new(8000, vec![vec![0.1, -0.7], vec![0.3, 0.2]]).unwrap();
        assert!((buf.peak() - 0.7).abs() < 1e-6);
    }
}
