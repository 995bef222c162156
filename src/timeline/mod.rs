//! Timeline modules
//!
//! Dub segments, the compositor that mixes them into one master buffer, and
//! the report it produces.

pub mod compositor;
pub mod report;
pub mod segment;
