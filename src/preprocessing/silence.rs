//! Leading/trailing silence trimming
//!
//! Synthesized speech usually arrives padded with near-silence on both ends,
//! which would eat into the slot it has to fit. Trimming scans channel 0
//! from each end and cuts every channel at the same frame boundaries.

use crate::io::buffer::AudioBuffer;

/// Default amplitude below which a sample counts as silent
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.005;

/// Find the audible frame range `[start, end)` of `samples`
///
/// Returns `None` when every sample is below `threshold` (or there are no
/// samples).
pub fn audible_range(samples: &[f32], threshold: f32) -> Option<(usize, usize)> {
    let start = samples.iter().position(|s| s.abs() >= threshold)?;
    let end = samples.iter().rposition(|s| s.abs() >= threshold)? + 1;
    if start >= end {
        return None;
    }
    Some((start, end))
}

/// Remove leading and trailing near-silence
///
/// Channel 0 decides the boundaries. A buffer that is empty or entirely
/// under `threshold` is returned unchanged, so the result is never empty
/// unless the input was. Trimming twice with the same threshold is a no-op
/// the second time.
pub fn trim_silence(buffer: &AudioBuffer, threshold: f32) -> AudioBuffer {
    match audible_range(buffer.channel(0), threshold) {
        Some((start, end)) => {
            if start == 0 && end == buffer.frame_count() {
                return buffer.clone();
            }
            log::debug!(
                "Trimming silence: keeping frames {}..{} of {}",
                start,
                end,
                buffer.frame_count()
            );
            buffer.slice_frames(start..end)
        }
        None => {
            log::debug!(
                "No audible frames above {:.4} in {} frames, leaving buffer as-is",
                threshold,
                buffer.frame_count()
            );
            buffer.clone()
        }
    }
}
