//! Raspberry Pi GPIO backend built on rppal.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use rppal::gpio::{Event, Gpio as RpiGpio, InputPin, Trigger};

use super::{resolve_pin, EdgeCallback, Gpio};
use crate::core::{ButtonsError, ButtonsResult, PinNumbering};

/// Hardware GPIO through `/dev/gpiomem`.
///
/// Pins are addressed with the configured numbering scheme; callbacks receive
/// the configured number, not the translated BCM line.
pub struct RppalGpio {
    gpio: RpiGpio,
    numbering: PinNumbering,
    pins: Mutex<HashMap<u8, InputPin>>,
    watched: Mutex<HashSet<u8>>,
}

impl std::fmt::Debug for RppalGpio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RppalGpio").field("numbering", &self.numbering).finish()
    }
}

impl RppalGpio {
    /// Open the GPIO peripheral.
    pub fn new(numbering: PinNumbering) -> ButtonsResult<Self> {
        let gpio = RpiGpio::new().map_err(|e| ButtonsError::Config(format!("GPIO unavailable: {e}")))?;
        Ok(Self {
            gpio,
            numbering,
            pins: Mutex::new(HashMap::new()),
            watched: Mutex::new(HashSet::new()),
        })
    }
}

impl Gpio for RppalGpio {
    fn configure_input(&self, pin: u8, pull_up: bool) -> ButtonsResult<()> {
        let bcm = resolve_pin(pin, self.numbering)?;
        let raw = self.gpio.get(bcm).map_err(|e| ButtonsError::gpio(pin, e.to_string()))?;
        let input = if pull_up { raw.into_input_pullup() } else { raw.into_input() };
        tracing::debug!(pin, bcm, pull_up, "Configured input");
        self.pins.lock().insert(pin, input);
        Ok(())
    }

    fn read_level(&self, pin: u8) -> ButtonsResult<bool> {
        self.pins
            .lock()
            .get(&pin)
            .map(InputPin::is_high)
            .ok_or_else(|| ButtonsError::gpio(pin, "pin is not configured as an input"))
    }

    fn watch_falling_edge(
        &self,
        pin: u8,
        debounce: Duration,
        callback: EdgeCallback,
    ) -> ButtonsResult<()> {
        let mut pins = self.pins.lock();
        let input = pins
            .get_mut(&pin)
            .ok_or_else(|| ButtonsError::gpio(pin, "pin is not configured as an input"))?;
        input
            .set_async_interrupt(Trigger::FallingEdge, Some(debounce), move |_event: Event| {
                callback(pin);
            })
            .map_err(|e| ButtonsError::gpio(pin, e.to_string()))?;
        self.watched.lock().insert(pin);
        Ok(())
    }

    fn unwatch(&self, pin: u8) -> ButtonsResult<()> {
        if !self.watched.lock().remove(&pin) {
            return Ok(());
        }
        if let Some(input) = self.pins.lock().get_mut(&pin) {
            input.clear_async_interrupt().map_err(|e| ButtonsError::gpio(pin, e.to_string()))?;
        }
        Ok(())
    }
}
