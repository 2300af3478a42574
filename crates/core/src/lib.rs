//! Core utilities for the rendering host.
//!
//! This crate provides foundational types and utilities used across the host:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame pacing clock
//! - Configuration loading

mod clock;
mod config;
mod error;
mod logging;

pub use clock::FrameClock;
pub use config::{ApplicationSettings, Settings};
pub use error::{Error, Result};
pub use logging::init_logging;
