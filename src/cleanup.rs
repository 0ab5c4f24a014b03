use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tracks paths that need cleanup on interruption
#[derive(Default)]
pub struct CleanupContext {
    #[cfg(test)]
    pub paths: Vec<PathBuf>,
    #[cfg(not(test))]
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path to be cleaned up on interruption
    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Remove a path from cleanup list
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    /// Remove every registered file that still exists
    pub fn cleanup(&self) {
        for path in &self.paths {
            if path.is_file() {
                debug!("Cleaning up: {:?}", path);
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

/// Type alias for shared cleanup context
pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

/// Create a new shared cleanup context
pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Registers a path for interruption cleanup for as long as the guard lives.
///
/// The owner of the path is responsible for removing it on ordinary failure;
/// the guard only covers the window in which the process may be interrupted.
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
    path: PathBuf,
}

impl CleanupGuard {
    pub fn new(ctx: SharedCleanupContext, path: PathBuf) -> Self {
        if let Ok(mut guard) = ctx.lock() {
            guard.add(path.clone());
        }
        Self { ctx, path }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.ctx.lock() {
            guard.remove(&self.path);
        }
    }
}
