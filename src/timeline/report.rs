//! Composite report types

use serde::{Deserialize, Serialize};

/// Where and how one segment landed in the master buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPlacement {
    /// Segment id
    pub id: u32,

    /// First master frame written, `round(start * sample_rate)`
    pub start_frame: usize,

    /// Frames summed into the master
    pub frames_written: usize,

    /// Frames that fell past the end of the master and were dropped
    pub frames_dropped: usize,

    /// Stretch factor applied, `None` when the audio fit within tolerance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stretch_factor: Option<f64>,

    /// Source sample rate when the audio had to be converted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resampled_from: Option<u32>,
}

/// A segment left out of the mix under `SegmentErrorPolicy::Skip`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSegment {
    /// Segment id
    pub id: u32,

    /// Error that prevented placement
    pub reason: String,
}

/// Summary of one composite run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeReport {
    /// Master buffer length in frames
    pub master_frames: usize,

    /// Master sample rate
    pub sample_rate: u32,

    /// Whether the original was mixed in underneath
    pub background_mixed: bool,

    /// Placed segments, in input order
    pub placements: Vec<SegmentPlacement>,

    /// Segments without audio (placeholders)
    pub silent_segments: Vec<u32>,

    /// Segments that failed to prepare and were skipped
    pub skipped: Vec<SkippedSegment>,

    /// Processing time in milliseconds
    pub processing_time_ms: f32,
}

impl CompositeReport {
    /// Placement of a given segment, if it was placed
    pub fn placement(&self, id: u32) -> Option<&SegmentPlacement> {
        self.placements.iter().find(|p| p.id == id)
    }

    /// Number of segments that were stretched
    pub fn stretched_count(&self) -> usize {
        self.placements
            .iter()
            .filter(|p| p.stretch_factor.is_some())
            .count()
    }
}
