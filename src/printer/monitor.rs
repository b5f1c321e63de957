//! Print lifecycle monitor.
//!
//! Polls the printer state and reports the job transitions the buttons care
//! about: a job starting and a job ending.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{JobPhase, PrinterControl};

/// Granularity of shutdown checks while waiting for the next poll.
const SHUTDOWN_CHECK: Duration = Duration::from_millis(100);

/// Consecutive unknown polls during a job before it is reported as failed.
pub const FAILED_AFTER_UNKNOWN_POLLS: u32 = 3;

/// Print lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintEvent {
    /// A job began
    PrintStarted,
    /// A job finished normally
    PrintDone,
    /// A job ended because the printer went away or errored
    PrintFailed,
    /// A job was cancelled
    PrintCancelled,
}

/// Derives [`PrintEvent`]s from the polled [`JobPhase`].
pub struct PrintMonitor {
    printer: Arc<dyn PrinterControl>,
    interval: Duration,
    active: bool,
    unknown_polls: u32,
}

impl std::fmt::Debug for PrintMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintMonitor")
            .field("interval", &self.interval)
            .field("active", &self.active)
            .field("unknown_polls", &self.unknown_polls)
            .finish()
    }
}

impl PrintMonitor {
    pub fn new(printer: Arc<dyn PrinterControl>, interval: Duration) -> Self {
        Self { printer, interval, active: false, unknown_polls: 0 }
    }

    /// Poll once and report the transition, if any.
    ///
    /// The first poll reports `PrintStarted` when a job is already running.
    /// A job only fails after [`FAILED_AFTER_UNKNOWN_POLLS`] unknown polls in
    /// a row, so a dropped request keeps the buttons armed.
    pub fn poll_once(&mut self) -> Option<PrintEvent> {
        let phase = self.printer.job_phase();
        if phase == JobPhase::Unknown {
            self.unknown_polls += 1;
        } else {
            self.unknown_polls = 0;
        }

        match (self.active, phase) {
            (false, JobPhase::Running) => {
                self.active = true;
                Some(PrintEvent::PrintStarted)
            }
            (true, JobPhase::Idle) => {
                self.active = false;
                Some(PrintEvent::PrintDone)
            }
            (true, JobPhase::Cancelling) => {
                self.active = false;
                Some(PrintEvent::PrintCancelled)
            }
            (true, JobPhase::Unknown) if self.unknown_polls >= FAILED_AFTER_UNKNOWN_POLLS => {
                self.active = false;
                Some(PrintEvent::PrintFailed)
            }
            _ => None,
        }
    }

    /// Poll on a background thread until `shutdown` is set.
    pub fn spawn<F>(mut self, shutdown: Arc<AtomicBool>, on_event: F) -> JoinHandle<()>
    where
        F: Fn(PrintEvent) + Send + 'static,
    {
        thread::spawn(move || {
            tracing::debug!(interval = ?self.interval, "Print monitor started");
            while !shutdown.load(Ordering::SeqCst) {
                if let Some(event) = self.poll_once() {
                    tracing::debug!(?event, "Print lifecycle event");
                    on_event(event);
                }

                let deadline = Instant::now() + self.interval;
                while !shutdown.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep(SHUTDOWN_CHECK.min(deadline - now));
                }
            }
            tracing::debug!("Print monitor stopped");
        })
    }
}
