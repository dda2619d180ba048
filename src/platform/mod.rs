//! Platform abstraction layer
//!
//! This module provides platform-specific implementations for:
//! - Process termination
//! - Hidden, detached script spawning
//! - Desktop notices
//! - Elevation check
//! - Termination signals

#[cfg(unix)]
pub mod unix;

#[cfg(target_os = "windows")]
pub mod windows;

// Re-export the current platform's modules
#[cfg(unix)]
pub use unix as current;

#[cfg(target_os = "windows")]
pub use windows as current;
