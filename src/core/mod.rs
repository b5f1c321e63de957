//! Core types for printbuttons.
//!
//! Configuration, the error type, and the button dispatcher that ties the
//! GPIO and printer capabilities together.

mod config;
mod dispatcher;
mod error;

pub use config::{
    default_shutdown_sequence, ButtonConfig, ButtonSettings, Config, GpioBackend, GpioConfig,
    OctoPrintConfig, PinNumbering, ServerConfig, StopMode, DEFAULT_BOUNCE_MS, DEFAULT_STOP_CODE,
    LOCAL_CONFIG_FILE, PIN_DISABLED,
};
pub use dispatcher::{messages, Button, ButtonDispatcher, PinReading, StatusReport};
pub use error::{ButtonsError, ButtonsResult};
