//! Printer stand-in that records every submission.

use parking_lot::Mutex;

use super::{JobPhase, PrinterControl, PrinterState};
use crate::core::{ButtonsError, ButtonsResult};

/// A submission received by [`RecordingPrinter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterCall {
    TogglePause,
    Resume,
    Cancel,
    Command(String),
}

#[derive(Debug)]
struct Inner {
    state: PrinterState,
    phase: Option<JobPhase>,
    calls: Vec<PrinterCall>,
    reject: bool,
}

/// In-memory printer with a settable state.
///
/// Submissions are recorded in order and do not change the state, so tests
/// can observe exactly what a button press produced.
#[derive(Debug)]
pub struct RecordingPrinter {
    inner: Mutex<Inner>,
}

impl Default for RecordingPrinter {
    fn default() -> Self {
        Self::new(PrinterState::Ready)
    }
}

impl RecordingPrinter {
    pub fn new(state: PrinterState) -> Self {
        Self { inner: Mutex::new(Inner { state, phase: None, calls: Vec::new(), reject: false }) }
    }

    /// Set the state. Also drops any phase set with [`RecordingPrinter::set_phase`].
    pub fn set_state(&self, state: PrinterState) {
        let mut inner = self.inner.lock();
        inner.state = state;
        inner.phase = None;
    }

    /// Report `phase` to the print monitor instead of deriving it from the
    /// state, like a host in a transitional state.
    pub fn set_phase(&self, phase: JobPhase) {
        self.inner.lock().phase = Some(phase);
    }

    /// Make submissions fail after being recorded.
    pub fn set_reject(&self, reject: bool) {
        self.inner.lock().reject = reject;
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<PrinterCall> {
        self.inner.lock().calls.clone()
    }

    /// Only the raw G-code lines received so far.
    pub fn commands(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                PrinterCall::Command(gcode) => Some(gcode.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PrinterCall) -> ButtonsResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        if inner.reject {
            return Err(ButtonsError::Printer { status: 409, message: "rejected".to_string() });
        }
        Ok(())
    }
}

impl PrinterControl for RecordingPrinter {
    fn state(&self) -> PrinterState {
        self.inner.lock().state
    }

    fn job_phase(&self) -> JobPhase {
        let inner = self.inner.lock();
        inner.phase.unwrap_or_else(|| inner.state.into())
    }

    fn toggle_pause(&self) -> ButtonsResult<()> {
        self.record(PrinterCall::TogglePause)
    }

    fn resume(&self) -> ButtonsResult<()> {
        self.record(PrinterCall::Resume)
    }

    fn cancel(&self) -> ButtonsResult<()> {
        self.record(PrinterCall::Cancel)
    }

    fn send_command(&self, gcode: &str) -> ButtonsResult<()> {
        self.record(PrinterCall::Command(gcode.to_string()))
    }
}
