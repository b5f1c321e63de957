//! Configuration management for printbuttons.
//!
//! Handles loading settings from TOML files and turning the raw button
//! settings into a validated [`ButtonConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ButtonsError, ButtonsResult};

/// Settings value that marks a button as disabled.
pub const PIN_DISABLED: i64 = -1;

/// Default debounce window in milliseconds.
pub const DEFAULT_BOUNCE_MS: i64 = 400;

/// Immediate-halt G-code.
pub const DEFAULT_STOP_CODE: &str = "M112";

/// Local config file name, looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "printbuttons.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Button settings (the plugin's persisted settings)
    pub buttons: ButtonSettings,

    /// GPIO backend selection
    pub gpio: GpioConfig,

    /// OctoPrint connection
    pub octoprint: OctoPrintConfig,

    /// Status endpoint
    pub server: ServerConfig,
}

/// Raw button settings, keyed the way the host persists them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonSettings {
    /// Pause button pin, -1 disables
    pub pause: i64,

    /// Stop button pin, -1 disables
    pub stop: i64,

    /// Debounce window in milliseconds
    pub bounce: i64,

    /// G-code sent by the stop button while printing
    pub stopcode: String,

    /// What the stop button does
    pub stop_mode: StopMode,

    /// Commands sent before cancelling a paused job in shutdown mode
    pub shutdown_sequence: Vec<String>,

    /// Subscribe to edges at startup instead of waiting for a print to start
    pub arm_on_startup: bool,
}

/// Behavior of the stop button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopMode {
    /// Printing: send the stop code. Paused: cancel the job.
    #[default]
    Command,
    /// Printing: cancel the job. Paused: run the shutdown sequence, then cancel.
    Shutdown,
}

/// GPIO settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// Which GPIO implementation to drive
    pub backend: GpioBackend,

    /// How pin numbers in `[buttons]` are interpreted
    pub numbering: PinNumbering,
}

/// Available GPIO implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackend {
    /// Raspberry Pi GPIO through rppal
    #[default]
    Rppal,
    /// In-memory pins, no hardware
    Fake,
}

/// Pin numbering scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinNumbering {
    /// Broadcom SoC GPIO numbers
    #[default]
    Bcm,
    /// Physical positions on the 40-pin header
    Board,
}

/// OctoPrint connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OctoPrintConfig {
    /// Base URL of the OctoPrint instance
    pub url: String,

    /// API key sent as `X-Api-Key`
    pub api_key: String,

    /// How often the print monitor polls printer state
    pub poll_interval_ms: u64,
}

/// Status endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Whether to serve `GET /status`
    pub enabled: bool,

    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            pause: PIN_DISABLED,
            stop: PIN_DISABLED,
            bounce: DEFAULT_BOUNCE_MS,
            stopcode: DEFAULT_STOP_CODE.to_string(),
            stop_mode: StopMode::default(),
            shutdown_sequence: default_shutdown_sequence(),
            arm_on_startup: true,
        }
    }
}

impl Default for OctoPrintConfig {
    fn default() -> Self {
        Self { url: "http://127.0.0.1:5000".to_string(), api_key: String::new(), poll_interval_ms: 1000 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { enabled: true, host: "127.0.0.1".to_string(), port: 5055 }
    }
}

/// Halt motion, heaters off, fan off, park, motors off.
pub fn default_shutdown_sequence() -> Vec<String> {
    ["G4", "M104 S0", "M140 S0", "M107", "G1 X0 Y200 F3000", "M84"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

impl OctoPrintConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl ServerConfig {
    /// Address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `printbuttons.toml` in current directory
    /// 2. `~/.config/printbuttons/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> ButtonsResult<Self> {
        match Self::locate() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Find the config file that [`Config::load`] would read.
    pub fn locate() -> Option<PathBuf> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        Self::config_dir().map(|dir| dir.join("config.toml")).filter(|path| path.exists())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> ButtonsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Override OctoPrint settings from `OCTOPRINT_URL` and `OCTOPRINT_API_KEY`.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("OCTOPRINT_URL") {
            if !url.is_empty() {
                self.octoprint.url = url;
            }
        }
        if let Ok(key) = std::env::var("OCTOPRINT_API_KEY") {
            if !key.is_empty() {
                self.octoprint.api_key = key;
            }
        }
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("printbuttons"))
    }
}

/// Validated, immutable button configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonConfig {
    /// Pause button pin, `None` when disabled
    pub pause_pin: Option<u8>,

    /// Stop button pin, `None` when disabled
    pub stop_pin: Option<u8>,

    /// Debounce window handed to the GPIO backend
    pub debounce: Duration,

    /// G-code sent by the stop button in [`StopMode::Command`]
    pub stop_command: String,

    /// Stop button behavior
    pub stop_mode: StopMode,

    /// Commands sent before cancelling in [`StopMode::Shutdown`]
    pub shutdown_sequence: Vec<String>,

    /// Arm edge detection from `on_start`
    pub arm_on_startup: bool,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            pause_pin: None,
            stop_pin: None,
            debounce: Duration::from_millis(DEFAULT_BOUNCE_MS.unsigned_abs()),
            stop_command: DEFAULT_STOP_CODE.to_string(),
            stop_mode: StopMode::default(),
            shutdown_sequence: default_shutdown_sequence(),
            arm_on_startup: true,
        }
    }
}

impl ButtonConfig {
    /// Validate raw settings.
    ///
    /// `-1` disables a button. Other negative values, values above 255, two
    /// buttons on one pin and a non-positive debounce window are rejected.
    pub fn from_settings(settings: &ButtonSettings) -> ButtonsResult<Self> {
        if settings.bounce <= 0 {
            return Err(ButtonsError::Config(format!(
                "bounce must be a positive number of milliseconds, got {}",
                settings.bounce
            )));
        }

        let stop_command = settings.stopcode.trim();
        let stop_command =
            if stop_command.is_empty() { DEFAULT_STOP_CODE } else { stop_command }.to_string();

        let pause_pin = parse_pin(settings.pause)?;
        let stop_pin = parse_pin(settings.stop)?;
        if let (Some(pause), Some(stop)) = (pause_pin, stop_pin) {
            if pause == stop {
                return Err(ButtonsError::Config(format!(
                    "pause and stop buttons cannot share GPIO {pause}"
                )));
            }
        }

        Ok(Self {
            pause_pin,
            stop_pin,
            debounce: Duration::from_millis(settings.bounce.unsigned_abs()),
            stop_command,
            stop_mode: settings.stop_mode,
            shutdown_sequence: settings.shutdown_sequence.clone(),
            arm_on_startup: settings.arm_on_startup,
        })
    }

    /// Configure both pins, keeping the other defaults.
    pub fn with_pins(mut self, pause: Option<u8>, stop: Option<u8>) -> Self {
        self.pause_pin = pause;
        self.stop_pin = stop;
        self
    }

    /// Set the stop mode.
    pub fn with_stop_mode(mut self, mode: StopMode) -> Self {
        self.stop_mode = mode;
        self
    }

    /// Configured pins, pause first.
    pub fn pins(&self) -> impl Iterator<Item = u8> + '_ {
        self.pause_pin.into_iter().chain(self.stop_pin)
    }
}

fn parse_pin(value: i64) -> ButtonsResult<Option<u8>> {
    if value == PIN_DISABLED {
        return Ok(None);
    }
    u8::try_from(value).map(Some).map_err(|_| ButtonsError::InvalidPin(value))
}
