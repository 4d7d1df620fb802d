//! Status line sinks driven by the deployment orchestrator

use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;

/// Receives the status text of a running deployment
pub trait StatusIndicator: Send + Sync {
    /// Replace the current status line
    fn set_text(&self, text: &str);

    /// Print a line that stays above the status line
    fn note(&self, text: &str);

    /// The attempt is over; no more calls follow
    fn stop(&self) {}
}

/// Writes status updates to stderr
#[derive(Debug, Default)]
pub struct ConsoleStatus {
    last: Mutex<Option<String>>,
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusIndicator for ConsoleStatus {
    fn set_text(&self, text: &str) {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if last.as_deref() == Some(text) {
            return;
        }
        *last = Some(text.to_string());

        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{} {}", ">".cyan().bold(), text);
    }

    fn note(&self, text: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", text.dimmed());
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentStatus;

impl StatusIndicator for SilentStatus {
    fn set_text(&self, _text: &str) {}

    fn note(&self, _text: &str) {}
}
