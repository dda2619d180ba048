//! Failures that abort a start transition and are shown to the user.
//!
//! Termination problems are not errors: they are reported as
//! [`KillOutcome`](crate::model::KillOutcome) values and only logged.

use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    /// The selected helper script does not exist.
    NotFound(PathBuf),
    /// The platform shell could not be spawned for the script.
    Launch { script: PathBuf, reason: String },
}

impl LifecycleError {
    pub fn title(&self) -> &'static str {
        match self {
            LifecycleError::NotFound(_) => "Script not found",
            LifecycleError::Launch { .. } => "Failed to start helper",
        }
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::NotFound(path) => {
                write!(f, "file not found: {}", path.display())
            }
            LifecycleError::Launch { script, reason } => {
                write!(f, "could not launch {}: {}", script.display(), reason)
            }
        }
    }
}

impl std::error::Error for LifecycleError {}
