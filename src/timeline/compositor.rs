//! Timeline compositor
//!
//! Places every dub segment inside its slot on one master buffer.
//!
//! Algorithm:
//! 1. Master length is `ceil(max(original duration, latest slot end) * rate)`
//! 2. Optionally mix the original underneath at `background_volume`
//! 3. For each segment with audio: convert to the master rate if needed,
//!    stretch by `audio / slot` duration unless within `slot_tolerance_secs`,
//!    match the master channel count
//! 4. Sum it into the master at `round(start * rate)`, dropping whatever
//!    would run past the end
//!
//! Segments are independent, so step 3 runs on the rayon pool; step 4 is a
//! single-threaded accumulation in input order. Overlapping segments add up
//! and may exceed [-1, 1]; the WAV encoder clamps.

use crate::config::{DubConfig, SegmentErrorPolicy};
use crate::error::{DubError, Result};
use crate::io::buffer::AudioBuffer;
use crate::preprocessing::channel_mixer::conform_channels;
use crate::preprocessing::resample::resample;
use crate::stretch::granular::time_stretch_with;
use crate::timeline::report::{CompositeReport, SegmentPlacement, SkippedSegment};
use crate::timeline::segment::{validate_segments, DubSegment};
use rayon::prelude::*;
use std::borrow::Cow;
use std::time::Instant;

/// Segment audio ready to be summed into the master
#[derive(Debug)]
struct PreparedSegment {
    audio: AudioBuffer,
    stretch_factor: Option<f64>,
    resampled_from: Option<u32>,
}

/// Bring one segment's audio to the master's rate, slot length and layout
fn prepare_segment(
    segment: &DubSegment,
    audio: &AudioBuffer,
    sample_rate: u32,
    channel_count: usize,
    config: &DubConfig,
) -> Result<PreparedSegment> {
    if audio.is_empty() {
        return Err(DubError::EmptyBuffer(format!(
            "segment {} audio has no frames",
            segment.id
        )));
    }

    let (rated, resampled_from): (Cow<'_, AudioBuffer>, Option<u32>) =
        if audio.sample_rate() != sample_rate {
            (
                Cow::Owned(resample(audio, sample_rate)?),
                Some(audio.sample_rate()),
            )
        } else {
            (Cow::Borrowed(audio), None)
        };

    let slot = segment.slot_duration();
    let duration = rated.duration_seconds();
    let (fitted, stretch_factor) = if (duration - slot).abs() <= config.slot_tolerance_secs {
        (rated, None)
    } else {
        let factor = duration / slot;
        log::debug!(
            "Segment {}: {:.3}s audio into {:.3}s slot, stretch factor {:.4}",
            segment.id,
            duration,
            slot,
            factor
        );
        let stretched = time_stretch_with(&rated, factor, &config.stretch_params())?;
        (Cow::Owned(stretched), Some(factor))
    };

    let audio = if fitted.channel_count() == channel_count {
        fitted.into_owned()
    } else {
        conform_channels(&fitted, channel_count)?
    };

    Ok(PreparedSegment {
        audio,
        stretch_factor,
        resampled_from,
    })
}

fn master_length(total_seconds: f64, sample_rate: u32, original_frames: usize) -> usize {
    // Small epsilon keeps exact products like 2.2 * 44100 from rounding up a frame
    let frames = (total_seconds * sample_rate as f64 - 1e-9).ceil().max(0.0) as usize;
    frames.max(original_frames)
}

/// Mix `segments` over `original` and return the master buffer
///
/// See [`composite_with_report`].
pub fn composite(
    original: &AudioBuffer,
    segments: &[DubSegment],
    config: &DubConfig,
) -> Result<AudioBuffer> {
    composite_with_report(original, segments, config).map(|(buffer, _)| buffer)
}

/// Mix `segments` over `original`, returning the master and a placement report
///
/// Segments without audio contribute silence. Inputs are never modified.
///
/// # Arguments
///
/// * `original` - Reference track; sets the master's rate and channel count
/// * `segments` - Slots with their synthesized audio, if any
/// * `config` - Tolerance, background volume, stretch and error policy
///
/// # Returns
///
/// The master buffer and a [`CompositeReport`] listing where each segment
/// landed, which were silent and which were skipped.
///
/// # Errors
///
/// - `InvalidInput` for an invalid config
/// - `InvalidSegment` for a bad slot or duplicate id
/// - `EmptyBuffer` if the timeline has zero length
/// - a segment preparation error, only when `on_segment_error` is `Abort`.
///   The default `Skip` leaves that slot silent and records it in
///   `report.skipped`, so one bad line does not cost the whole mix.
pub fn composite_with_report(
    original: &AudioBuffer,
    segments: &[DubSegment],
    config: &DubConfig,
) -> Result<(AudioBuffer, CompositeReport)> {
    let start_time = Instant::now();
    config.validate()?;
    validate_segments(segments)?;

    let sample_rate = original.sample_rate();
    let channel_count = original.channel_count();
    let total_seconds = segments
        .iter()
        .map(|s| s.end_seconds)
        .fold(original.duration_seconds(), f64::max);
    let master_frames = master_length(total_seconds, sample_rate, original.frame_count());
    if master_frames == 0 {
        return Err(DubError::EmptyBuffer(
            "Timeline has zero duration".to_string(),
        ));
    }

    log::debug!(
        "Compositing {} segments into {} frames ({:.3}s, {} channels at {} Hz)",
        segments.len(),
        master_frames,
        total_seconds,
        channel_count,
        sample_rate
    );

    let mut master = vec![vec![0.0f32; master_frames]; channel_count];
    let mut report = CompositeReport {
        master_frames,
        sample_rate,
        ..Default::default()
    };

    if config.background_volume > 0.0 {
        for (out, bed) in master.iter_mut().zip(original.channels()) {
            for (o, &s) in out.iter_mut().zip(bed) {
                *o += s * config.background_volume;
            }
        }
        report.background_mixed = true;
    }

    let audible: Vec<(&DubSegment, &AudioBuffer)> = segments
        .iter()
        .filter_map(|s| s.audio.as_ref().map(|a| (s, a)))
        .collect();
    report.silent_segments = segments
        .iter()
        .filter(|s| s.audio.is_none())
        .map(|s| s.id)
        .collect();

    let prepared: Vec<(&DubSegment, Result<PreparedSegment>)> = if config.parallel_stretch {
        audible
            .par_iter()
            .map(|&(segment, audio)| {
                let result = prepare_segment(segment, audio, sample_rate, channel_count, config);
                (segment, result)
            })
            .collect()
    } else {
        audible
            .iter()
            .map(|&(segment, audio)| {
                let result = prepare_segment(segment, audio, sample_rate, channel_count, config);
                (segment, result)
            })
            .collect()
    };

    for (segment, result) in prepared {
        let prepared = match result {
            Ok(prepared) => prepared,
            Err(e) => match config.on_segment_error {
                SegmentErrorPolicy::Abort => return Err(e),
                SegmentErrorPolicy::Skip => {
                    log::warn!("Skipping segment {}: {}", segment.id, e);
                    report.skipped.push(SkippedSegment {
                        id: segment.id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            },
        };

        let start_frame =
            ((segment.start_seconds * sample_rate as f64).round() as usize).min(master_frames);
        let available = master_frames.saturating_sub(start_frame);
        let frames = prepared.audio.frame_count().min(available);
        let dropped = prepared.audio.frame_count() - frames;
        if dropped > 0 {
            log::warn!(
                "Segment {} runs {} frames past the end of the timeline",
                segment.id,
                dropped
            );
        }

        for (out, src) in master.iter_mut().zip(prepared.audio.channels()) {
            for (o, &s) in out[start_frame..start_frame + frames].iter_mut().zip(src) {
                *o += s;
            }
        }

        report.placements.push(SegmentPlacement {
            id: segment.id,
            start_frame,
            frames_written: frames,
            frames_dropped: dropped,
            stretch_factor: prepared.stretch_factor,
            resampled_from: prepared.resampled_from,
        });
    }

    report.processing_time_ms = start_time.elapsed().as_secs_f32() * 1000.0;
    log::debug!(
        "Composite done: {} placed ({} stretched), {} silent, {} skipped in {:.2} ms",
        report.placements.len(),
        report.stretched_count(),
        report.silent_segments.len(),
        report.skipped.len(),
        report.processing_time_ms
    );

    Ok((AudioBuffer::from_planar(sample_rate, master), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stretch::granular::time_stretch;

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
                    * amplitude
            })
            .collect()
    }

    fn original_10s() -> AudioBuffer {
        AudioBuffer::mono(24000, sine(100.0, 0.3, 24000, 240_000)).unwrap()
    }

    #[test]
    fn test_slot_adherence() {
        let original = original_10s();
        let speech = AudioBuffer::mono(24000, sine(220.0, 0.5, 24000, 72_000)).unwrap();
        let segments = vec![DubSegment::new(1, 2.0, 4.0, "line")
            .unwrap()
            .with_audio(speech.clone())];

        let (master, report) =
            composite_with_report(&original, &segments, &DubConfig::default()).unwrap();

        assert_eq!(master.frame_count(), 240_000);
        let placement = report.placement(1).unwrap();
        assert_eq!(placement.start_frame, 48_000);
        assert!((placement.frames_written as i64 - 48_000).abs() <= 1);
        assert_eq!(placement.stretch_factor, Some(1.5));

        let expected = time_stretch(&speech, 1.5).unwrap();
        let placed = &master.channel(0)[48_000..48_000 + expected.frame_count()];
        for (a, b) in placed.iter().zip(expected.channel(0)) {
            assert!((a - b).abs() < 1e-6);
        }
        // background muted by default: nothing outside the slot
        assert!(master.channel(0)[..48_000].iter().all(|&s| s == 0.0));
        assert!(master.channel(0)[96_000..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_within_tolerance_is_not_stretched() {
        let original = original_10s();
        let speech = AudioBuffer::mono(24000, vec![0.25; 48_720]).unwrap(); // 2.03 s
        let segments = vec![DubSegment::new(1, 1.0, 3.0, "")
            .unwrap()
            .with_audio(speech)];

        let (master, report) =
            composite_with_report(&original, &segments, &DubConfig::default()).unwrap();

        let placement = report.placement(1).unwrap();
        assert_eq!(placement.stretch_factor, None);
        assert_eq!(placement.frames_written, 48_720);
        assert_eq!(master.channel(0)[24_000], 0.25);
        assert_eq!(master.channel(0)[24_000 + 48_719], 0.25);
        assert_eq!(master.channel(0)[24_000 + 48_720], 0.0);
    }

    #[test]
    fn test_gap_filling_all_placeholders() {
        let original = original_10s();
        let segments = vec![
            DubSegment::new(1, 0.0, 2.0, "a").unwrap(),
            DubSegment::new(2, 3.0, 5.0, "b").unwrap(),
        ];

        let (muted, report) =
            composite_with_report(&original, &segments, &DubConfig::default()).unwrap();
        assert!(muted.channel(0).iter().all(|&s| s == 0.0));
        assert_eq!(report.silent_segments, vec![1, 2]);
        assert!(report.placements.is_empty());

        let config = DubConfig {
            background_volume: 0.5,
            ..Default::default()
        };
        let bed = composite(&original, &segments, &config).unwrap();
        for (a, b) in bed.channel(0).iter().zip(original.channel(0)) {
            assert!((a - b * 0.5).abs() < 1e-7);
        }
    }

    #[test]
    fn test_timeline_extends_past_original() {
        let original = AudioBuffer::silent(24000, 1, 24_000).unwrap();
        let segments = vec![DubSegment::new(1, 1.5, 2.5, "").unwrap()];
        let master = composite(&original, &segments, &DubConfig::default()).unwrap();
        assert_eq!(master.frame_count(), 60_000);
    }

    #[test]
    fn test_overlapping_segments_sum() {
        let original = AudioBuffer::silent(24000, 1, 24_000 * 4).unwrap();
        let a = AudioBuffer::mono(24000, vec![0.6; 24_000]).unwrap();
        let b = AudioBuffer::mono(24000, vec![0.7; 24_000]).unwrap();
        let segments = vec![
            DubSegment::new(1, 1.0, 2.0, "").unwrap().with_audio(a),
            DubSegment::new(2, 1.5, 2.5, "").unwrap().with_audio(b),
        ];
        let master = composite(&original, &segments, &DubConfig::default()).unwrap();

        assert!((master.channel(0)[30_000] - 0.6).abs() < 1e-6);
        assert!((master.channel(0)[40_000] - 1.3).abs() < 1e-6);
        assert!((master.channel(0)[50_000] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_tail_is_dropped_at_master_end() {
        let original = AudioBuffer::silent(24000, 1, 24_000).unwrap();
        let speech = AudioBuffer::mono(24000, vec![0.1; 12_960]).unwrap(); // 0.54 s
        let segments = vec![DubSegment::new(1, 0.5, 1.0, "")
            .unwrap()
            .with_audio(speech)];
        let (master, report) =
            composite_with_report(&original, &segments, &DubConfig::default()).unwrap();

        assert_eq!(master.frame_count(), 24_000);
        let placement = report.placement(1).unwrap();
        assert_eq!(placement.frames_written, 12_000);
        assert_eq!(placement.frames_dropped, 960);
    }

    #[test]
    fn test_segment_error_policy() {
        let original = original_10s();
        let too_short = AudioBuffer::mono(24000, vec![0.5; 1000]).unwrap();
        let good = AudioBuffer::mono(24000, vec![0.2; 24_000]).unwrap();
        let segments = vec![
            DubSegment::new(1, 0.0, 1.0, "").unwrap().with_audio(too_short),
            DubSegment::new(2, 2.0, 3.0, "").unwrap().with_audio(good),
        ];

        let config = DubConfig {
            on_segment_error: SegmentErrorPolicy::Abort,
            ..Default::default()
        };
        let aborted = composite(&original, &segments, &config);
        assert!(matches!(aborted, Err(DubError::InputTooShort { .. })));

        let (master, report) =
            composite_with_report(&original, &segments, &DubConfig::default()).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, 1);
        assert!(report.placement(2).is_some());
        assert!(master.channel(0)[..24_000].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_overcompressed_segment_is_skipped_not_silenced() {
        let original = AudioBuffer::silent(24000, 1, 24_000).unwrap();
        let speech = AudioBuffer::mono(24000, sine(200.0, 0.5, 24000, 12_000)).unwrap();
        let segments = vec![DubSegment::new(1, 0.5, 0.55, "")
            .unwrap()
            .with_audio(speech)];

        let (master, report) =
            composite_with_report(&original, &segments, &DubConfig::default()).unwrap();
        assert!(report.placements.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, 1);
        assert_eq!(master.peak(), 0.0);

        let config = DubConfig {
            on_segment_error: SegmentErrorPolicy::Abort,
            ..Default::default()
        };
        assert!(matches!(
            composite(&original, &segments, &config),
            Err(DubError::EmptyBuffer(_))
        ));
    }

    #[test]
    fn test_segment_rate_is_converted() {
        let original = AudioBuffer::silent(48000, 1, 48_000 * 3).unwrap();
        let speech = AudioBuffer::mono(24000, vec![0.3; 24_000]).unwrap();
        let segments = vec![DubSegment::new(1, 1.0, 2.0, "")
            .unwrap()
            .with_audio(speech)];
        let (master, report) =
            composite_with_report(&original, &segments, &DubConfig::default()).unwrap();

        let placement = report.placement(1).unwrap();
        assert_eq!(placement.resampled_from, Some(24000));
        assert_eq!(placement.start_frame, 48_000);
        assert_eq!(placement.frames_written, 48_000);
        assert_eq!(master.sample_rate(), 48000);
    }

    #[test]
    fn test_mono_segment_into_stereo_master() {
        let original = AudioBuffer::silent(24000, 2, 48_000).unwrap();
        let speech = AudioBuffer::mono(24000, vec![0.4; 24_000]).unwrap();
        let segments = vec![DubSegment::new(1, 0.5, 1.5, "")
            .unwrap()
            .with_audio(speech)];
        let master = composite(&original, &segments, &DubConfig::default()).unwrap();

        assert_eq!(master.channel_count(), 2);
        assert_eq!(master.channel(0), master.channel(1));
        assert_eq!(master.channel(1)[20_000], 0.4);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let original = original_10s();
        let segments: Vec<DubSegment> = (0..4)
            .map(|i| {
                let speech =
                    AudioBuffer::mono(24000, sine(150.0 + i as f32 * 40.0, 0.3, 24000, 30_000 + i * 9000))
                        .unwrap();
                DubSegment::new(i as u32, i as f64 * 2.0, i as f64 * 2.0 + 1.5, "")
                    .unwrap()
                    .with_audio(speech)
            })
            .collect();

        let parallel = composite(&original, &segments, &DubConfig::default()).unwrap();
        let sequential = composite(
            &original,
            &segments,
            &DubConfig {
                parallel_stretch: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_empty_timeline() {
        let original = AudioBuffer::silent(24000, 1, 0).unwrap();
        let result = composite(&original, &[], &DubConfig::default());
        assert!(matches!(result, Err(DubError::EmptyBuffer(_))));
    }

    #[test]
    fn test_invalid_segment_rejected() {
        let original = original_10s();
        let mut segment = DubSegment::new(1, 1.0, 2.0, "").unwrap();
        segment.end_seconds = 0.5;
        let result = composite(&original, &[segment], &DubConfig::default());
        assert!(matches!(result, Err(DubError::InvalidSegment { id: 1, .. })));
    }
}
