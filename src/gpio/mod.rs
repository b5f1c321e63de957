//! GPIO capability consumed by the button dispatcher.
//!
//! The dispatcher never touches hardware directly: it is handed a [`Gpio`]
//! implementation at construction. Debouncing is the backend's job.

mod fake;
mod numbering;
#[cfg(feature = "rpi")]
mod hardware;

use std::sync::Arc;
use std::time::Duration;

pub use fake::FakeGpio;
pub use numbering::{board_to_bcm, resolve_pin};
#[cfg(feature = "rpi")]
pub use hardware::RppalGpio;

use crate::core::ButtonsResult;

/// Callback invoked with the pin number on a debounced falling edge.
///
/// May run on a backend-owned thread, concurrently with other callbacks.
pub type EdgeCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Digital input capability.
pub trait Gpio: Send + Sync {
    /// Configure `pin` as an input, optionally with pull-up bias.
    fn configure_input(&self, pin: u8, pull_up: bool) -> ButtonsResult<()>;

    /// Current logic level of `pin` (`true` = high).
    fn read_level(&self, pin: u8) -> ButtonsResult<bool>;

    /// Subscribe to falling edges on `pin`, replacing any existing watch.
    ///
    /// Edges closer together than `debounce` are suppressed.
    fn watch_falling_edge(
        &self,
        pin: u8,
        debounce: Duration,
        callback: EdgeCallback,
    ) -> ButtonsResult<()>;

    /// Remove the watch on `pin`. A no-op when nothing is watched.
    fn unwatch(&self, pin: u8) -> ButtonsResult<()>;
}
