use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A short-lived audio file that is deleted when the guard goes out of scope.
///
/// Created before a window or clip edge is cut and dropped on every exit path,
/// so thousands of windows never pile up on disk.
#[derive(Debug)]
pub struct TransientClip {
    path: PathBuf,
}

impl TransientClip {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientClip {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed transient clip {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove transient clip {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
