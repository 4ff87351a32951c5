//! Worker threads for the game's background capabilities
//!
//! Every long-lived background capability (the generation job worker, the
//! speech synthesizer, the voice player) runs on a named, joinable thread
//! owned by exactly one object. Nothing here is detached: owners stop their
//! workers through a [`StopSignal`] or by closing the worker's channel, then
//! [`Thread::join`] it.
//!
//! # Design Notes
//!
//! - `std::thread::Builder` for named spawning
//! - `StopSignal` is a shared cancellation token polled by worker loops
//! - A panicking worker surfaces as `ThreadError::JoinFailed` at join time,
//!   never as a panic on the owning thread

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

/// Error type for threading operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadError {
    /// Thread spawn failed
    #[error("Thread spawn failed: {0}")]
    SpawnFailed(String),
    /// Thread join failed
    #[error("Thread join failed: {0}")]
    JoinFailed(String),
}

pub type Result<T> = std::result::Result<T, ThreadError>;

// ============================================================================
// Thread Handle
// ============================================================================

/// Handle to a spawned worker thread
///
/// Wraps a `JoinHandle` and keeps the worker's name for diagnostics.
pub struct Thread<T> {
    handle: Option<JoinHandle<T>>,
    name: String,
}

impl<T> Thread<T> {
    /// Spawn a new named thread that executes the given function
    ///
    /// # Errors
    /// Returns `ThreadError::SpawnFailed` if the OS refuses to create the thread
    pub fn spawn<F>(name: &str, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .map_err(|e| ThreadError::SpawnFailed(format!("{}: {}", name, e)))?;

        Ok(Self {
            handle: Some(handle),
            name: name.to_string(),
        })
    }

    /// Wait for the thread to finish and return its result
    ///
    /// # Errors
    /// Returns `ThreadError::JoinFailed` if the thread panicked
    pub fn join(mut self) -> Result<T> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ThreadError::JoinFailed(format!("{} panicked", self.name))),
            None => Err(ThreadError::JoinFailed(format!(
                "{} already joined",
                self.name
            ))),
        }
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        match &self.handle {
            Some(handle) => !handle.is_finished(),
            None => false,
        }
    }

    /// The name the thread was spawned with
    pub fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Stop Signal
// ============================================================================

/// Cancellation token shared between an owner and its worker loops
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this signal to stop
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether `stop()` has been called on any clone
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Sleep the current thread
pub fn hibernate_thread(duration: Duration) {
    thread::sleep(duration);
}
