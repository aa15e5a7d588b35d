//! Freeze event export
//!
//! This module provides loggers that persist freeze events for offline analysis.
//! Currently supports JSON Lines: one serialized [`freezemon_common::UiFreezeEvent`]
//! per line.

pub mod json_lines;

pub use json_lines::{read_events, JsonLinesLogger};
