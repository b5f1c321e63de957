//! Printer Control capability.
//!
//! Trait interface to the printer host plus its implementations: the
//! OctoPrint REST client, a recording stand-in, and the state monitor that
//! turns polled state into print lifecycle events.

mod monitor;
#[cfg(feature = "octoprint")]
mod octoprint;
mod recording;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use monitor::{PrintEvent, PrintMonitor};
#[cfg(feature = "octoprint")]
pub use octoprint::OctoPrintClient;
pub use recording::{PrinterCall, RecordingPrinter};

use crate::core::ButtonsResult;

/// G-code that shows a message on the printer's display.
pub const DISPLAY_GCODE: &str = "M117";

/// Printer state as seen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterState {
    /// Connected and idle
    Ready,
    /// A job is running
    Printing,
    /// A job is paused
    Paused,
    /// Disconnected, erroring, or anything else
    #[default]
    Unknown,
}

impl PrinterState {
    /// Status string reported by the status endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Printing => "printing",
            Self::Paused => "paused",
            Self::Unknown => "unknown",
        }
    }
}

/// Where the current job is in its lifecycle.
///
/// Finer than [`PrinterState`]: hosts report transitional states (pausing,
/// resuming, finishing) that still belong to a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// No job
    Idle,
    /// A job is printing, paused, or moving between the two
    Running,
    /// A job is being cancelled
    Cancelling,
    /// The host could not be reached or reported nothing usable
    Unknown,
}

impl From<PrinterState> for JobPhase {
    fn from(state: PrinterState) -> Self {
        match state {
            PrinterState::Printing | PrinterState::Paused => Self::Running,
            PrinterState::Ready => Self::Idle,
            PrinterState::Unknown => Self::Unknown,
        }
    }
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands and state queries against the printer host.
///
/// Submissions are fire-and-forget: an `Ok` means the host accepted the
/// request, not that the printer executed it.
pub trait PrinterControl: Send + Sync {
    /// Snapshot of the current printer state.
    fn state(&self) -> PrinterState;

    /// Lifecycle phase of the current job, used by the print monitor.
    fn job_phase(&self) -> JobPhase {
        self.state().into()
    }

    /// Pause a running job, or resume a paused one.
    fn toggle_pause(&self) -> ButtonsResult<()>;

    /// Resume a paused job.
    fn resume(&self) -> ButtonsResult<()>;

    /// Cancel the current job.
    fn cancel(&self) -> ButtonsResult<()>;

    /// Send a raw G-code line.
    fn send_command(&self, gcode: &str) -> ButtonsResult<()>;

    fn is_printing(&self) -> bool {
        self.state() == PrinterState::Printing
    }

    fn is_paused(&self) -> bool {
        self.state() == PrinterState::Paused
    }

    fn is_ready(&self) -> bool {
        self.state() == PrinterState::Ready
    }

    /// Show `text` on the printer's display.
    fn display(&self, text: &str) -> ButtonsResult<()> {
        self.send_command(&format!("{DISPLAY_GCODE} {text}"))
    }
}
