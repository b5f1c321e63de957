//! # printbuttons
//!
//! Physical push-buttons for pausing and cancelling 3D prints.
//!
//! Two buttons wired to GPIO pins (active-low, internal pull-up) control an
//! OctoPrint host: the pause button toggles pause/resume of the running job,
//! the stop button sends an emergency stop or cancels the job.
//!
//! ## Features
//!
//! - **Debounced buttons**: falling-edge detection with a configurable window
//! - **Two stop behaviors**: immediate-halt G-code, or a shutdown sequence
//!   followed by a cancel
//! - **Print-aware**: buttons are armed when a job starts and released when
//!   it ends
//! - **Status endpoint**: `GET /status` reports live pin levels and printer state
//!
//! ## Quick Start
//!
//! ```bash
//! # Build for a Raspberry Pi
//! cargo install printbuttons --features rpi
//!
//! # Run with ./printbuttons.toml or ~/.config/printbuttons/config.toml
//! printbuttons run
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::use_self)]

pub mod api;
pub mod app;
pub mod core;
pub mod gpio;
pub mod printer;

pub use api::{route, ApiError, ApiResponse, ApiResult, StatusServer};
pub use gpio::{EdgeCallback, FakeGpio, Gpio};
#[cfg(feature = "rpi")]
pub use gpio::RppalGpio;
#[cfg(feature = "octoprint")]
pub use printer::OctoPrintClient;
pub use printer::{
    JobPhase, PrintEvent, PrintMonitor, PrinterCall, PrinterControl, PrinterState,
    RecordingPrinter,
};

// Re-export commonly used types
pub use app::App;
pub use crate::core::{
    Button, ButtonConfig, ButtonDispatcher, ButtonsError, ButtonsResult, Config, PinReading,
    StatusReport, StopMode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
