//! Configuration parameters for dubbing composition

use crate::error::{DubError, Result};
use crate::preprocessing::silence::DEFAULT_SILENCE_THRESHOLD;
use crate::stretch::granular::{StretchParams, DEFAULT_GRAIN_SIZE, DEFAULT_STRETCH_GAIN};
use serde::{Deserialize, Serialize};

/// Sample rate of raw PCM returned by the speech synthesis service
pub const DEFAULT_SPEECH_SAMPLE_RATE: u32 = 24000;

/// What the compositor does when one segment cannot be prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentErrorPolicy {
    /// Fail the whole composite
    Abort,
    /// Leave the segment silent and record it in the report
    #[default]
    Skip,
}

/// Dubbing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DubConfig {
    // Slot fitting
    /// Allowed slot/audio duration mismatch before stretching, seconds (default: 0.05)
    pub slot_tolerance_secs: f64,

    /// Gain of the original track under the dub (default: 0.0, muted)
    pub background_volume: f32,

    // Speech ingestion
    /// Amplitude under which synthesized speech counts as silent (default: 0.005)
    pub silence_threshold: f32,

    /// Trim leading/trailing silence from synthesized speech (default: true)
    pub trim_synthesized: bool,

    /// Sample rate of raw PCM speech payloads (default: 24000)
    pub speech_sample_rate: u32,

    // Time stretch
    /// Grain length in frames, even (default: 2048)
    pub grain_size: usize,

    /// Fixed attenuation after overlap-add (default: 0.9)
    pub stretch_gain: f32,

    // Compositor
    /// Handling of segments that fail to prepare (default: Skip)
    pub on_segment_error: SegmentErrorPolicy,

    /// Prepare segments on the rayon thread pool (default: true)
    pub parallel_stretch: bool,
}

impl Default for DubConfig {
    fn default() -> Self {
        Self {
            slot_tolerance_secs: 0.05,
            background_volume: 0.0,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            trim_synthesized: true,
            speech_sample_rate: DEFAULT_SPEECH_SAMPLE_RATE,
            grain_size: DEFAULT_GRAIN_SIZE,
            stretch_gain: DEFAULT_STRETCH_GAIN,
            on_segment_error: SegmentErrorPolicy::Skip,
            parallel_stretch: true,
        }
    }
}

impl DubConfig {
    /// Check that every field is usable
    pub fn validate(&self) -> Result<()> {
        if !self.slot_tolerance_secs.is_finite() || self.slot_tolerance_secs < 0.0 {
            return Err(DubError::InvalidInput(format!(
                "slot_tolerance_secs must be finite and >= 0, got {}",
                self.slot_tolerance_secs
            )));
        }
        if !self.background_volume.is_finite() || self.background_volume < 0.0 {
            return Err(DubError::InvalidInput(format!(
                "background_volume must be finite and >= 0, got {}",
                self.background_volume
            )));
        }
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(DubError::InvalidInput(format!(
                "silence_threshold must be finite and >= 0, got {}",
                self.silence_threshold
            )));
        }
        if self.speech_sample_rate == 0 {
            return Err(DubError::InvalidInput(
                "speech_sample_rate must be > 0".to_string(),
            ));
        }
        if self.grain_size < 2 || self.grain_size % 2 != 0 {
            return Err(DubError::InvalidInput(format!(
                "grain_size must be even and >= 2, got {}",
                self.grain_size
            )));
        }
        if !self.stretch_gain.is_finite() || self.stretch_gain <= 0.0 {
            return Err(DubError::InvalidInput(format!(
                "stretch_gain must be finite and > 0, got {}",
                self.stretch_gain
            )));
        }
        Ok(())
    }

    /// Stretch parameters derived from this config
    pub fn stretch_params(&self) -> StretchParams {
        StretchParams {
            grain_size: self.grain_size,
            output_gain: self.stretch_gain,
        }
    }
}
