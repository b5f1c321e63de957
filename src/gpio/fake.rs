//! In-memory GPIO backend.
//!
//! Used when no hardware is available and throughout the tests. Enforces the
//! debounce window the same way the hardware backend does: an edge is only
//! delivered if at least `debounce` has passed since the last delivered edge
//! on that pin.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{EdgeCallback, Gpio};
use crate::core::{ButtonsError, ButtonsResult};

#[derive(Default)]
struct FakePin {
    pull_up: bool,
    level: bool,
    watch: Option<Watch>,
}

struct Watch {
    debounce: Duration,
    callback: EdgeCallback,
    last_edge: Option<Instant>,
}

/// GPIO backend with simulated pins.
#[derive(Default)]
pub struct FakeGpio {
    pins: Mutex<HashMap<u8, FakePin>>,
    rejected: Mutex<HashSet<u8>>,
}

impl std::fmt::Debug for FakeGpio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeGpio").field("pins", &self.pins.lock().len()).finish()
    }
}

impl FakeGpio {
    /// Create a backend with no configured pins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `pin` fail, like a pin the board doesn't have.
    pub fn reject_pin(&self, pin: u8) {
        self.rejected.lock().insert(pin);
    }

    /// Whether `pin` has been configured as an input.
    pub fn is_configured(&self, pin: u8) -> bool {
        self.pins.lock().contains_key(&pin)
    }

    /// Whether `pin` was configured with pull-up bias.
    pub fn has_pull_up(&self, pin: u8) -> bool {
        self.pins.lock().get(&pin).is_some_and(|p| p.pull_up)
    }

    /// Whether `pin` has an active edge watch.
    pub fn is_watched(&self, pin: u8) -> bool {
        self.pins.lock().get(&pin).is_some_and(|p| p.watch.is_some())
    }

    /// Number of pins with an active edge watch.
    pub fn watch_count(&self) -> usize {
        self.pins.lock().values().filter(|p| p.watch.is_some()).count()
    }

    /// Drive `pin` low now. Returns `true` if the edge was delivered.
    pub fn press(&self, pin: u8) -> bool {
        self.press_at(pin, Instant::now())
    }

    /// Drive `pin` low at `at`. Returns `true` if the edge was delivered.
    ///
    /// The callback runs on the calling thread with no internal lock held.
    pub fn press_at(&self, pin: u8, at: Instant) -> bool {
        let callback = {
            let mut pins = self.pins.lock();
            let Some(state) = pins.get_mut(&pin) else {
                return false;
            };
            let was_high = state.level;
            state.level = false;

            match state.watch.as_mut() {
                Some(watch) if was_high || watch.last_edge.is_none() => {
                    let settled = watch
                        .last_edge
                        .map_or(true, |last| at.saturating_duration_since(last) >= watch.debounce);
                    if settled {
                        watch.last_edge = Some(at);
                        Some(Arc::clone(&watch.callback))
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };

        match callback {
            Some(callback) => {
                callback(pin);
                true
            }
            None => false,
        }
    }

    /// Let `pin` float back high.
    pub fn release(&self, pin: u8) {
        if let Some(state) = self.pins.lock().get_mut(&pin) {
            state.level = true;
        }
    }

    /// Press and immediately release `pin`. Returns `true` if the edge was delivered.
    pub fn click_at(&self, pin: u8, at: Instant) -> bool {
        let delivered = self.press_at(pin, at);
        self.release(pin);
        delivered
    }

    fn check(&self, pin: u8) -> ButtonsResult<()> {
        if self.rejected.lock().contains(&pin) {
            return Err(ButtonsError::gpio(pin, "pin is not available on this board"));
        }
        Ok(())
    }
}

impl Gpio for FakeGpio {
    fn configure_input(&self, pin: u8, pull_up: bool) -> ButtonsResult<()> {
        self.check(pin)?;
        let mut pins = self.pins.lock();
        let state = pins.entry(pin).or_default();
        state.pull_up = pull_up;
        state.level = pull_up;
        Ok(())
    }

    fn read_level(&self, pin: u8) -> ButtonsResult<bool> {
        self.check(pin)?;
        self.pins
            .lock()
            .get(&pin)
            .map(|p| p.level)
            .ok_or_else(|| ButtonsError::gpio(pin, "pin is not configured as an input"))
    }

    fn watch_falling_edge(
        &self,
        pin: u8,
        debounce: Duration,
        callback: EdgeCallback,
    ) -> ButtonsResult<()> {
        self.check(pin)?;
        let mut pins = self.pins.lock();
        let state = pins
            .get_mut(&pin)
            .ok_or_else(|| ButtonsError::gpio(pin, "pin is not configured as an input"))?;
        state.watch = Some(Watch { debounce, callback, last_edge: None });
        Ok(())
    }

    fn unwatch(&self, pin: u8) -> ButtonsResult<()> {
        if let Some(state) = self.pins.lock().get_mut(&pin) {
            state.watch = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, EdgeCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let callback: EdgeCallback = Arc::new(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn test_pull_up_reads_high() {
        let gpio = FakeGpio::new();
        gpio.configure_input(17, true).unwrap();
        assert!(gpio.read_level(17).unwrap());
        assert!(gpio.has_pull_up(17));

        gpio.press(17);
        assert!(!gpio.read_level(17).unwrap());
        gpio.release(17);
        assert!(gpio.read_level(17).unwrap());
    }

    #[test]
    fn test_read_unconfigured_pin_fails() {
        let gpio = FakeGpio::new();
        assert!(gpio.read_level(4).is_err());
    }

    #[test]
    fn test_watch_requires_configured_pin() {
        let gpio = FakeGpio::new();
        let (_, callback) = counter();
        assert!(gpio.watch_falling_edge(4, Duration::from_millis(10), callback).is_err());
    }

    #[test]
    fn test_debounce_window() {
        let gpio = FakeGpio::new();
        gpio.configure_input(17, true).unwrap();
        let (count, callback) = counter();
        gpio.watch_falling_edge(17, Duration::from_millis(400), callback).unwrap();

        let t0 = Instant::now();
        assert!(gpio.click_at(17, t0));
        assert!(!gpio.click_at(17, t0 + Duration::from_millis(100)));
        assert!(!gpio.click_at(17, t0 + Duration::from_millis(399)));
        assert!(gpio.click_at(17, t0 + Duration::from_millis(400)));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_held_button_fires_once() {
        let gpio = FakeGpio::new();
        gpio.configure_input(17, true).unwrap();
        let (count, callback) = counter();
        gpio.watch_falling_edge(17, Duration::from_millis(1), callback).unwrap();

        let t0 = Instant::now();
        assert!(gpio.press_at(17, t0));
        // Still low: no new falling edge.
        assert!(!gpio.press_at(17, t0 + Duration::from_secs(1)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unwatch_is_idempotent() {
        let gpio = FakeGpio::new();
        assert!(gpio.unwatch(17).is_ok());

        gpio.configure_input(17, true).unwrap();
        let (count, callback) = counter();
        gpio.watch_falling_edge(17, Duration::from_millis(10), callback).unwrap();
        assert!(gpio.is_watched(17));

        gpio.unwatch(17).unwrap();
        gpio.unwatch(17).unwrap();
        assert!(!gpio.is_watched(17));
        assert!(!gpio.press(17));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rewatch_replaces_callback() {
        let gpio = FakeGpio::new();
        gpio.configure_input(17, true).unwrap();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();
        gpio.watch_falling_edge(17, Duration::from_millis(10), first_cb).unwrap();
        gpio.watch_falling_edge(17, Duration::from_millis(10), second_cb).unwrap();

        assert_eq!(gpio.watch_count(), 1);
        gpio.press(17);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejected_pin() {
        let gpio = FakeGpio::new();
        gpio.reject_pin(99);
        assert!(matches!(gpio.configure_input(99, true), Err(ButtonsError::Gpio { pin: 99, .. })));
    }

    #[test]
    fn test_callback_may_reenter() {
        let gpio = Arc::new(FakeGpio::new());
        gpio.configure_input(17, true).unwrap();
        let inner = Arc::clone(&gpio);
        let callback: EdgeCallback = Arc::new(move |pin| {
            // Reading and unwatching from inside the callback must not deadlock.
            assert!(!inner.read_level(pin).unwrap());
            inner.unwatch(pin).unwrap();
        });
        gpio.watch_falling_edge(17, Duration::from_millis(10), callback).unwrap();

        assert!(gpio.press(17));
        assert!(!gpio.is_watched(17));
    }
}
