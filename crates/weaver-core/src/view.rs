//! Progress and error reporting sink.
//!
//! The tick loop reports run-level progress through a [`ViewSink`] so a
//! front end can show it without the core knowing about terminals.

use tracing::{error, info};

/// Receiver of progress and error messages.
///
/// Implementations must return quickly; they are called from the
/// simulation thread.
pub trait ViewSink: Send + Sync {
    /// A progress message.
    fn update_log(&self, message: &str);

    /// An error message.
    fn update_log_error(&self, message: &str);
}

/// Forwards messages to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingView;

impl ViewSink for TracingView {
    fn update_log(&self, message: &str) {
        info!(target: "weaver::view", "{message}");
    }

    fn update_log_error(&self, message: &str) {
        error!(target: "weaver::view", "{message}");
    }
}

/// Drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpView;

impl ViewSink for NoOpView {
    fn update_log(&self, _message: &str) {}

    fn update_log_error(&self, _message: &str) {}
}
