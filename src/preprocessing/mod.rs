//! Audio preprocessing modules
//!
//! Utilities that prepare segment audio before it reaches the compositor:
//! - Silence trimming of synthesized speech
//! - Channel conforming (mono speech into a multichannel master)
//! - Explicit sample rate conversion

pub mod channel_mixer;
pub mod resample;
pub mod silence;
