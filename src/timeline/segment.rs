//! Dub segments and the timeline they live on

use crate::config::DubConfig;
use crate::error::{DubError, Result};
use crate::io::buffer::AudioBuffer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One transcribed line and its slot on the original timeline
///
/// Created per line by the transcription workflow; the only later changes
/// are attaching the translation and then the synthesized audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DubSegment {
    /// Unique within a timeline
    pub id: u32,

    /// Slot start, seconds from the start of the original
    pub start_seconds: f64,

    /// Slot end, seconds (exclusive, > start)
    pub end_seconds: f64,

    /// Transcribed text in the source language
    pub source_text: String,

    /// Translation, once available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,

    /// Synthesized speech; `None` plays as silence
    #[serde(skip)]
    pub audio: Option<AudioBuffer>,
}

impl DubSegment {
    /// Create a segment with no translation and no audio yet
    ///
    /// # Errors
    ///
    /// `InvalidSegment` unless `0 <= start < end` and both are finite.
    pub fn new(
        id: u32,
        start_seconds: f64,
        end_seconds: f64,
        source_text: impl Into<String>,
    ) -> Result<Self> {
        let segment = Self {
            id,
            start_seconds,
            end_seconds,
            source_text: source_text.into(),
            translated_text: None,
            audio: None,
        };
        segment.validate()?;
        Ok(segment)
    }

    /// Check the slot invariants
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| DubError::InvalidSegment {
            id: self.id,
            reason: reason.to_string(),
        };
        if !self.start_seconds.is_finite() || !self.end_seconds.is_finite() {
            return Err(invalid("slot bounds must be finite"));
        }
        if self.start_seconds < 0.0 {
            return Err(invalid("slot starts before zero"));
        }
        if self.start_seconds >= self.end_seconds {
            return Err(invalid("slot start must be before its end"));
        }
        Ok(())
    }

    /// Slot length in seconds
    pub fn slot_duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Attach the translated text
    pub fn attach_translation(&mut self, text: impl Into<String>) {
        self.translated_text = Some(text.into());
    }

    /// Attach synthesized audio
    pub fn attach_audio(&mut self, audio: AudioBuffer) {
        self.audio = Some(audio);
    }

    /// Builder form of [`attach_translation`](Self::attach_translation)
    pub fn with_translation(mut self, text: impl Into<String>) -> Self {
        self.attach_translation(text);
        self
    }

    /// Builder form of [`attach_audio`](Self::attach_audio)
    pub fn with_audio(mut self, audio: AudioBuffer) -> Self {
        self.attach_audio(audio);
        self
    }
}

/// Validate every segment and reject duplicate ids
pub fn validate_segments(segments: &[DubSegment]) -> Result<()> {
    let mut seen = HashSet::with_capacity(segments.len());
    for segment in segments {
        segment.validate()?;
        if !seen.insert(segment.id) {
            return Err(DubError::InvalidSegment {
                id: segment.id,
                reason: "duplicate segment id".to_string(),
            });
        }
    }
    Ok(())
}

/// The original track plus the ordered dub segments placed over it
#[derive(Debug, Clone)]
pub struct Timeline {
    /// Reference waveform
    pub original: AudioBuffer,

    /// Segments in transcription order
    pub segments: Vec<DubSegment>,
}

impl Timeline {
    /// Build a timeline, validating the segments
    pub fn new(original: AudioBuffer, segments: Vec<DubSegment>) -> Result<Self> {
        validate_segments(&segments)?;
        Ok(Self { original, segments })
    }

    /// Latest point either the original or a slot reaches, seconds
    pub fn total_duration(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.end_seconds)
            .fold(self.original.duration_seconds(), f64::max)
    }

    /// Mix the timeline into one buffer
    pub fn render(&self, config: &DubConfig) -> Result<AudioBuffer> {
        crate::timeline::compositor::composite(&self.original, &self.segments, config)
    }

    /// Mix the timeline and encode it as WAV
    pub fn render_wav(&self, config: &DubConfig) -> Result<Vec<u8>> {
        crate::io::wav::encode_wav(&self.render(config)?)
    }
}
