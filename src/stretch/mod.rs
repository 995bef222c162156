//! Pitch-preserving time stretching
//!
//! The offline export path uses fixed-hop granular overlap-add, see
//! [`granular`].

pub mod granular;

pub use granular::{time_stretch, time_stretch_with, StretchParams};
