//! Multi-rater performance rating engine.
//!
//! Reduces 360° survey responses into calibrated performance ratings and
//! talent-grid placements, and serves them through a hybrid live/cached read
//! path.

pub mod config;
pub mod error;
pub mod ratings;
pub mod telemetry;
