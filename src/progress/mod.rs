//! Progress reporting and cancellation for long-running passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Named progress channels. Every heavy loop reports through one of
/// these so external progress UIs stay accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressChannel {
    /// Metadata probing and subtitle parsing.
    Probe,
    /// Decode-integrity checking.
    Decode,
}

/// Callback surface for UI integration.
///
/// `should_cancel` is polled at window granularity during decode work, so
/// a cancel request is honored promptly even mid-file.
pub trait CheckCallbacks: Send + Sync {
    /// A pass is starting; `total` is the planned work unit count and
    /// reflects actual planned work (deduplicated streams excluded).
    fn on_start(&self, channel: ProgressChannel, total: u64);

    /// Work units completed so far on a channel.
    fn on_progress(&self, channel: ProgressChannel, completed: u64, total: u64);

    /// Logger sink for human-facing progress lines.
    fn on_log(&self, message: &str);

    /// Cooperative cancellation signal.
    fn should_cancel(&self) -> bool;
}

/// No-op callbacks for library use without a UI.
pub struct NoOpCallbacks;

impl CheckCallbacks for NoOpCallbacks {
    fn on_start(&self, _channel: ProgressChannel, _total: u64) {}
    fn on_progress(&self, _channel: ProgressChannel, _completed: u64, _total: u64) {}
    fn on_log(&self, _message: &str) {}
    fn should_cancel(&self) -> bool {
        false
    }
}

/// Console callbacks for CLI usage; cancellation wired to an external
/// flag (Ctrl+C handler).
pub struct ConsoleCallbacks {
    cancel_flag: Arc<AtomicBool>,
}

impl ConsoleCallbacks {
    pub fn new(cancel_flag: Arc<AtomicBool>) -> Self {
        Self { cancel_flag }
    }

    fn channel_name(channel: ProgressChannel) -> &'static str {
        match channel {
            ProgressChannel::Probe => "probe",
            ProgressChannel::Decode => "decode",
        }
    }
}

impl CheckCallbacks for ConsoleCallbacks {
    fn on_start(&self, channel: ProgressChannel, total: u64) {
        eprintln!("{}: 0/{}", Self::channel_name(channel), total);
    }

    fn on_progress(&self, channel: ProgressChannel, completed: u64, total: u64) {
        eprintln!("{}: {}/{}", Self::channel_name(channel), completed, total);
    }

    fn on_log(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn should_cancel(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_callbacks_observe_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let callbacks = ConsoleCallbacks::new(flag.clone());
        assert!(!callbacks.should_cancel());
        flag.store(true, Ordering::SeqCst);
        assert!(callbacks.should_cancel());
    }
}
