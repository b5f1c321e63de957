//! Error types shared by the dispatcher and its capabilities.

use thiserror::Error;

/// Result type for button and printer operations.
pub type ButtonsResult<T> = Result<T, ButtonsError>;

/// Errors that can occur while wiring buttons to the printer.
#[derive(Debug, Error)]
pub enum ButtonsError {
    /// The GPIO backend rejected an operation on a pin.
    #[error("GPIO error on pin {pin}: {message}")]
    Gpio { pin: u8, message: String },

    /// Pin number that cannot be mapped to a GPIO line.
    #[error("Invalid pin number: {0}")]
    InvalidPin(i64),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The printer host answered with an error status.
    #[error("Printer error: {status} - {message}")]
    Printer { status: u16, message: String },

    /// The status endpoint could not be started.
    #[error("Status server error: {0}")]
    Server(String),

    /// HTTP request to the printer host failed.
    #[cfg(feature = "octoprint")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ButtonsError {
    /// Shorthand for a GPIO error on `pin`.
    pub fn gpio(pin: u8, message: impl Into<String>) -> Self {
        Self::Gpio { pin, message: message.into() }
    }
}
