//! Live preview scheduling
//!
//! Plays the bed and the dub segments against an output device clock. Slot
//! fitting here uses the device's playback rate (plain resampling), so a
//! sped-up segment also sounds slightly higher. That is accepted for
//! previews; exports go through the pitch-preserving
//! [`compositor`](crate::timeline::compositor).
//!
//! The device itself sits behind [`PreviewOutput`]. The scheduler only
//! decides what starts when, keeps a handle for everything it started, and
//! stops all of it on seek, stop or drop.

use crate::config::DubConfig;
use crate::error::{DubError, Result};
use crate::io::buffer::AudioBuffer;
use crate::timeline::segment::{validate_segments, DubSegment};
use std::sync::Arc;

/// Default delay between a play/seek call and the first scheduled audio
pub const DEFAULT_LOOKAHEAD_SECS: f64 = 0.05;

/// One buffer to be started on the output device
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRequest {
    /// Audio to play
    pub buffer: Arc<AudioBuffer>,

    /// Device clock time at which playback begins, seconds
    pub start_at: f64,

    /// Position inside `buffer` to start from, seconds of source audio
    pub offset_seconds: f64,

    /// Device playback rate; above 1 plays faster (and higher)
    pub playback_rate: f64,

    /// Linear gain
    pub gain: f32,
}

/// Output device seam
pub trait PreviewOutput {
    /// Handle for a started voice
    type Voice;

    /// Current device clock, seconds
    fn now(&self) -> f64;

    /// Schedule a buffer on the device
    fn start_voice(&mut self, request: VoiceRequest) -> Result<Self::Voice>;

    /// Stop a voice, whether it has started sounding or not
    fn stop_voice(&mut self, voice: Self::Voice);
}

#[derive(Debug, Clone)]
struct Cue {
    id: u32,
    start: f64,
    end: f64,
    audio: Arc<AudioBuffer>,
    rate: f64,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    device_time: f64,
    timeline_offset: f64,
}

/// Real-time preview of a dubbed timeline
pub struct PlaybackScheduler<O: PreviewOutput> {
    output: O,
    bed: Arc<AudioBuffer>,
    background_volume: f32,
    cues: Vec<Cue>,
    duration: f64,
    lookahead: f64,
    voices: Vec<O::Voice>,
    anchor: Option<Anchor>,
}

impl<O: PreviewOutput> PlaybackScheduler<O> {
    /// Prepare a preview of `original` with `segments` on top
    ///
    /// Segments without audio (or with an empty buffer) are left out.
    pub fn new(
        output: O,
        original: &AudioBuffer,
        segments: &[DubSegment],
        config: &DubConfig,
    ) -> Result<Self> {
        config.validate()?;
        validate_segments(segments)?;

        let cues: Vec<Cue> = segments
            .iter()
            .filter_map(|segment| {
                let audio = segment.audio.as_ref().filter(|a| !a.is_empty())?;
                let slot = segment.slot_duration();
                let duration = audio.duration_seconds();
                let rate = if (duration - slot).abs() <= config.slot_tolerance_secs {
                    1.0
                } else {
                    duration / slot
                };
                Some(Cue {
                    id: segment.id,
                    start: segment.start_seconds,
                    end: segment.end_seconds,
                    audio: Arc::new(audio.clone()),
                    rate,
                })
            })
            .collect();

        let duration = cues
            .iter()
            .map(|c| c.end)
            .fold(original.duration_seconds(), f64::max);

        log::debug!(
            "Preview prepared: {} audible cues, {:.3}s timeline",
            cues.len(),
            duration
        );

        Ok(Self {
            output,
            bed: Arc::new(original.clone()),
            background_volume: config.background_volume,
            cues,
            duration,
            lookahead: DEFAULT_LOOKAHEAD_SECS,
            voices: Vec::new(),
            anchor: None,
        })
    }

    /// Override the start delay
    pub fn with_lookahead(mut self, seconds: f64) -> Self {
        self.lookahead = seconds.max(0.0);
        self
    }

    /// Start playback at `offset` seconds into the timeline
    ///
    /// Anything previously scheduled is cancelled first. A segment already
    /// in progress at `offset` starts immediately from the matching point
    /// in its audio.
    pub fn play_from(&mut self, offset: f64) -> Result<()> {
        if !offset.is_finite() || offset < 0.0 {
            return Err(DubError::InvalidInput(format!(
                "Preview offset must be finite and >= 0, got {}",
                offset
            )));
        }

        self.cancel_all();
        let start_at = self.output.now() + self.lookahead;

        let mut requests = Vec::with_capacity(self.cues.len() + 1);
        if self.background_volume > 0.0 && offset < self.bed.duration_seconds() {
            requests.push(VoiceRequest {
                buffer: Arc::clone(&self.bed),
                start_at,
                offset_seconds: offset,
                playback_rate: 1.0,
                gain: self.background_volume,
            });
        }

        for cue in &self.cues {
            if cue.end <= offset {
                continue;
            }
            let (delay, source_offset) = if cue.start >= offset {
                (cue.start - offset, 0.0)
            } else {
                (0.0, (offset - cue.start) * cue.rate)
            };
            if source_offset >= cue.audio.duration_seconds() {
                continue;
            }
            log::debug!(
                "Cue {} at +{:.3}s, source offset {:.3}s, rate {:.3}",
                cue.id,
                delay,
                source_offset,
                cue.rate
            );
            requests.push(VoiceRequest {
                buffer: Arc::clone(&cue.audio),
                start_at: start_at + delay,
                offset_seconds: source_offset,
                playback_rate: cue.rate,
                gain: 1.0,
            });
        }

        for request in requests {
            match self.output.start_voice(request) {
                Ok(voice) => self.voices.push(voice),
                Err(e) => {
                    log::warn!("Preview start failed, releasing scheduled voices: {}", e);
                    self.cancel_all();
                    self.anchor = None;
                    return Err(e);
                }
            }
        }

        self.anchor = Some(Anchor {
            device_time: start_at,
            timeline_offset: offset,
        });
        Ok(())
    }

    /// Jump to `offset`, rescheduling everything from there
    pub fn seek(&mut self, offset: f64) -> Result<()> {
        log::debug!("Preview seek to {:.3}s", offset);
        self.play_from(offset)
    }

    /// Stop and release every scheduled voice
    pub fn stop(&mut self) {
        self.cancel_all();
        self.anchor = None;
    }

    /// True between a successful play/seek and the next stop
    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    /// Current timeline position while playing
    pub fn position(&self) -> Option<f64> {
        self.anchor.map(|anchor| {
            let elapsed = (self.output.now() - anchor.device_time).max(0.0);
            (anchor.timeline_offset + elapsed).min(self.duration)
        })
    }

    /// Timeline length in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of voices currently held
    pub fn scheduled_voices(&self) -> usize {
        self.voices.len()
    }

    /// The output device
    pub fn output(&self) -> &O {
        &self.output
    }

    /// The output device, mutably
    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    fn cancel_all(&mut self) {
        for voice in self.voices.drain(..) {
            self.output.stop_voice(voice);
        }
    }
}

impl<O: PreviewOutput> Drop for PlaybackScheduler<O> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
