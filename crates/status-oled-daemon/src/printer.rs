//! Printer job state as reported by the host.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Answers whether the printer is idle.
///
/// The progress bar is only redrawn from its stored value while a job is
/// active.
pub trait PrinterState: Send + Sync {
    fn is_ready(&self) -> bool;
}

/// Tracks the printer state from lifecycle events.
#[derive(Debug)]
pub struct JobTracker {
    ready: AtomicBool,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTracker {
    /// Creates a tracker for an idle printer.
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
        }
    }

    /// Records an event; returns true if it changed the job state.
    pub fn observe(&self, event: PrinterEvent) -> bool {
        let ready = match event {
            PrinterEvent::PrintStarted | PrinterEvent::PrintResumed | PrinterEvent::PrintPaused => {
                false
            }
            PrinterEvent::PrintDone | PrinterEvent::PrintFailed | PrinterEvent::PrintCancelled => {
                true
            }
            PrinterEvent::Shutdown => return false,
        };
        self.ready.swap(ready, Ordering::SeqCst) != ready
    }
}

impl PrinterState for JobTracker {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Host lifecycle events the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterEvent {
    PrintStarted,
    PrintResumed,
    PrintPaused,
    PrintDone,
    PrintFailed,
    PrintCancelled,
    Shutdown,
}

impl FromStr for PrinterEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PrintStarted" => Ok(PrinterEvent::PrintStarted),
            "PrintResumed" => Ok(PrinterEvent::PrintResumed),
            "PrintPaused" => Ok(PrinterEvent::PrintPaused),
            "PrintDone" => Ok(PrinterEvent::PrintDone),
            "PrintFailed" => Ok(PrinterEvent::PrintFailed),
            "PrintCancelled" => Ok(PrinterEvent::PrintCancelled),
            "Shutdown" => Ok(PrinterEvent::Shutdown),
            _ => Err(format!("Unknown event: {}", s)),
        }
    }
}

impl fmt::Display for PrinterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let tracker = JobTracker::new();
        assert!(tracker.is_ready());

        assert!(tracker.observe(PrinterEvent::PrintStarted));
        assert!(!tracker.is_ready());
        assert!(!tracker.observe(PrinterEvent::PrintPaused));
        assert!(!tracker.is_ready());

        assert!(tracker.observe(PrinterEvent::PrintDone));
        assert!(tracker.is_ready());
        assert!(!tracker.observe(PrinterEvent::Shutdown));
        assert!(tracker.is_ready());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            "PrintCancelled".parse::<PrinterEvent>().unwrap(),
            PrinterEvent::PrintCancelled
        );
        assert_eq!(PrinterEvent::Shutdown.to_string(), "Shutdown");
        assert!("printstarted".parse::<PrinterEvent>().is_err());
    }
}
