//! Button dispatcher.
//!
//! Maps debounced button presses to printer commands based on the printer
//! state at the moment of the press. Holds no mutable state: every edge is
//! handled independently, so concurrent callbacks need no locking here.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use super::config::{ButtonConfig, StopMode};
use super::error::ButtonsResult;
use crate::gpio::{EdgeCallback, Gpio};
use crate::printer::{PrintEvent, PrinterControl, PrinterState};

/// Display messages sent with `M117`.
pub mod messages {
    pub const PAUSED: &str = "Printer paused";
    pub const PAUSE_PRESSED: &str = "PAUSE button pressed";
    pub const EMERGENCY_STOP: &str = "Emergency Stop";
    pub const JOB_CANCELLED: &str = "Job cancelled";
    pub const STOP_PRESSED: &str = "STOP button pressed";
}

/// The two physical buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Pause,
    Stop,
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => f.write_str("Pause"),
            Self::Stop => f.write_str("Stop"),
        }
    }
}

/// Raw pin reading as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinReading {
    /// Button not configured
    #[serde(rename = "-1")]
    Disabled,
    /// Line is low (active-low: pressed)
    #[serde(rename = "0")]
    Pressed,
    /// Line is high (pulled up: released)
    #[serde(rename = "1")]
    Released,
}

impl PinReading {
    fn from_level(high: bool) -> Self {
        if high {
            Self::Released
        } else {
            Self::Pressed
        }
    }
}

/// Snapshot of both buttons and the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub pause: PinReading,
    pub stop: PinReading,
    pub status: PrinterState,
}

/// Wires the pause and stop buttons to the printer.
pub struct ButtonDispatcher {
    config: ButtonConfig,
    gpio: Arc<dyn Gpio>,
    printer: Arc<dyn PrinterControl>,
    this: Weak<ButtonDispatcher>,
}

impl fmt::Debug for ButtonDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ButtonDispatcher").field("config", &self.config).finish()
    }
}

impl ButtonDispatcher {
    /// Create a dispatcher owning the given capabilities.
    ///
    /// Nothing touches the GPIO backend until [`ButtonDispatcher::on_start`].
    pub fn new(
        config: ButtonConfig,
        gpio: Arc<dyn Gpio>,
        printer: Arc<dyn PrinterControl>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self { config, gpio, printer, this: this.clone() })
    }

    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }

    fn buttons(&self) -> impl Iterator<Item = (Button, u8)> + '_ {
        self.config
            .pause_pin
            .map(|pin| (Button::Pause, pin))
            .into_iter()
            .chain(self.config.stop_pin.map(|pin| (Button::Stop, pin)))
    }

    /// The button wired to `pin`, if any.
    pub fn button_for(&self, pin: u8) -> Option<Button> {
        self.buttons().find(|(_, p)| *p == pin).map(|(button, _)| button)
    }

    /// Startup hook: set up configured pins as pulled-up inputs.
    ///
    /// Disabled buttons are skipped. Any GPIO failure is fatal.
    pub fn on_start(&self) -> ButtonsResult<()> {
        for (button, pin) in self.buttons() {
            tracing::info!("{} button setup on GPIO [{}]...", button, pin);
            self.gpio.configure_input(pin, true)?;
        }

        if self.config.arm_on_startup {
            self.arm()?;
        }
        Ok(())
    }

    /// Subscribe to falling edges on every configured pin.
    ///
    /// Existing watches are removed first, so arming twice leaves exactly one
    /// subscription per pin. On failure no pin is left armed.
    pub fn arm(&self) -> ButtonsResult<()> {
        self.disarm();
        for (button, pin) in self.buttons() {
            tracing::debug!("Arming {} button on GPIO [{}]", button, pin);
            if let Err(e) =
                self.gpio.watch_falling_edge(pin, self.config.debounce, self.edge_callback())
            {
                self.disarm();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove edge subscriptions. Failures are ignored.
    pub fn disarm(&self) {
        for (_, pin) in self.buttons() {
            if let Err(e) = self.gpio.unwatch(pin) {
                tracing::debug!("Ignoring unwatch failure on GPIO [{}]: {}", pin, e);
            }
        }
    }

    fn edge_callback(&self) -> EdgeCallback {
        let this = self.this.clone();
        Arc::new(move |pin| {
            if let Some(dispatcher) = this.upgrade() {
                dispatcher.handle_edge(pin);
            }
        })
    }

    /// Lifecycle hook: a job started.
    pub fn on_print_started(&self) -> ButtonsResult<()> {
        tracing::info!("Printing started. Buttons enabled.");
        self.arm()
    }

    /// Lifecycle hook: a job finished, failed or was cancelled.
    pub fn on_print_ended(&self) {
        tracing::info!("Printing stopped. Buttons disabled.");
        self.disarm();
    }

    /// Route a lifecycle event to its hook.
    pub fn on_event(&self, event: PrintEvent) {
        match event {
            PrintEvent::PrintStarted => {
                if let Err(e) = self.on_print_started() {
                    tracing::error!("Failed to enable buttons: {}", e);
                }
            }
            PrintEvent::PrintDone | PrintEvent::PrintFailed | PrintEvent::PrintCancelled => {
                self.on_print_ended();
            }
        }
    }

    /// Edge callback: dispatch a debounced press on `pin`.
    pub fn handle_edge(&self, pin: u8) {
        tracing::debug!("Detected button [{}]", pin);
        match self.button_for(pin) {
            Some(Button::Pause) => {
                tracing::debug!("Pause button pushed");
                self.pause_pressed(self.printer.state());
            }
            Some(Button::Stop) => {
                tracing::debug!("Stop button pushed");
                self.stop_pressed(self.printer.state());
            }
            None => tracing::debug!("No button on GPIO [{}], ignoring", pin),
        }
    }

    fn pause_pressed(&self, state: PrinterState) {
        match state {
            PrinterState::Printing => {
                self.submit("toggle pause", self.printer.toggle_pause());
                self.display(messages::PAUSED);
            }
            PrinterState::Paused => self.submit("resume", self.printer.resume()),
            PrinterState::Ready | PrinterState::Unknown => self.display(messages::PAUSE_PRESSED),
        }
    }

    fn stop_pressed(&self, state: PrinterState) {
        match (self.config.stop_mode, state) {
            (StopMode::Command, PrinterState::Printing) => {
                self.display(messages::EMERGENCY_STOP);
                self.gcode(&self.config.stop_command);
            }
            (StopMode::Command, PrinterState::Paused)
            | (StopMode::Shutdown, PrinterState::Printing) => {
                self.display(messages::JOB_CANCELLED);
                self.submit("cancel", self.printer.cancel());
            }
            (StopMode::Shutdown, PrinterState::Paused) => {
                for gcode in &self.config.shutdown_sequence {
                    self.gcode(gcode);
                }
                self.display(messages::JOB_CANCELLED);
                self.submit("cancel", self.printer.cancel());
            }
            (_, PrinterState::Ready | PrinterState::Unknown) => {
                self.display(messages::STOP_PRESSED);
            }
        }
    }

    fn display(&self, text: &str) {
        self.submit(text, self.printer.display(text));
    }

    fn gcode(&self, gcode: &str) {
        self.submit(gcode, self.printer.send_command(gcode));
    }

    fn submit(&self, what: &str, result: ButtonsResult<()>) {
        match result {
            Ok(()) => tracing::debug!("Sent {}", what),
            Err(e) => tracing::warn!("Printer did not accept {}: {}", what, e),
        }
    }

    /// Raw pin levels and printer state, read now.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            pause: self.read_pin(self.config.pause_pin),
            stop: self.read_pin(self.config.stop_pin),
            status: self.printer.state(),
        }
    }

    fn read_pin(&self, pin: Option<u8>) -> PinReading {
        let Some(pin) = pin else {
            return PinReading::Disabled;
        };
        match self.gpio.read_level(pin) {
            Ok(high) => PinReading::from_level(high),
            Err(e) => {
                tracing::warn!("Could not read GPIO [{}]: {}", pin, e);
                PinReading::Disabled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::core::config::default_shutdown_sequence;
    use crate::gpio::FakeGpio;
    use crate::printer::{PrinterCall, RecordingPrinter};

    const PAUSE: u8 = 17;
    const STOP: u8 = 27;

    struct Rig {
        gpio: Arc<FakeGpio>,
        printer: Arc<RecordingPrinter>,
        dispatcher: Arc<ButtonDispatcher>,
    }

    fn rig(config: ButtonConfig, state: PrinterState) -> Rig {
        let gpio = Arc::new(FakeGpio::new());
        let printer = Arc::new(RecordingPrinter::new(state));
        let dispatcher = ButtonDispatcher::new(
            config,
            Arc::clone(&gpio) as Arc<dyn Gpio>,
            Arc::clone(&printer) as Arc<dyn PrinterControl>,
        );
        Rig { gpio, printer, dispatcher }
    }

    fn both_buttons() -> ButtonConfig {
        ButtonConfig::default().with_pins(Some(PAUSE), Some(STOP))
    }

    fn cmd(gcode: &str) -> PrinterCall {
        PrinterCall::Command(gcode.to_string())
    }

    #[test]
    fn test_on_start_configures_pull_up_inputs() {
        let rig = rig(both_buttons(), PrinterState::Ready);
        rig.dispatcher.on_start().unwrap();

        assert!(rig.gpio.has_pull_up(PAUSE));
        assert!(rig.gpio.has_pull_up(STOP));
        assert!(rig.gpio.is_watched(PAUSE));
        assert!(rig.gpio.is_watched(STOP));
    }

    #[test]
    fn test_on_start_without_arming() {
        let config = ButtonConfig { arm_on_startup: false, ..both_buttons() };
        let rig = rig(config, PrinterState::Ready);
        rig.dispatcher.on_start().unwrap();

        assert!(rig.gpio.is_configured(PAUSE));
        assert_eq!(rig.gpio.watch_count(), 0);
    }

    #[test]
    fn test_disabled_pause_is_never_subscribed() {
        let config = ButtonConfig::default().with_pins(None, Some(STOP));
        let rig = rig(config, PrinterState::Printing);
        rig.dispatcher.on_start().unwrap();
        rig.dispatcher.on_print_started().unwrap();

        assert!(!rig.gpio.is_configured(PAUSE));
        assert_eq!(rig.gpio.watch_count(), 1);
        assert_eq!(rig.dispatcher.status().pause, PinReading::Disabled);
    }

    #[test]
    fn test_on_start_propagates_gpio_failure() {
        let rig = rig(both_buttons(), PrinterState::Ready);
        rig.gpio.reject_pin(STOP);
        assert!(rig.dispatcher.on_start().is_err());
    }

    #[test]
    fn test_failed_arm_leaves_no_pin_armed() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        // Only the pause pin is an input, so watching the stop pin fails.
        rig.gpio.configure_input(PAUSE, true).unwrap();

        assert!(rig.dispatcher.arm().is_err());
        assert_eq!(rig.gpio.watch_count(), 0);
        assert!(!rig.gpio.press(PAUSE));
        assert!(rig.printer.calls().is_empty());
    }

    #[test]
    fn test_pause_while_printing() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.handle_edge(PAUSE);
        assert_eq!(rig.printer.calls(), vec![PrinterCall::TogglePause, cmd("M117 Printer paused")]);
    }

    #[test]
    fn test_pause_while_paused_resumes() {
        let rig = rig(both_buttons(), PrinterState::Paused);
        rig.dispatcher.handle_edge(PAUSE);
        assert_eq!(rig.printer.calls(), vec![PrinterCall::Resume]);
    }

    #[test]
    fn test_pause_while_idle() {
        let rig = rig(both_buttons(), PrinterState::Ready);
        rig.dispatcher.handle_edge(PAUSE);
        assert_eq!(rig.printer.calls(), vec![cmd("M117 PAUSE button pressed")]);
    }

    #[test]
    fn test_stop_while_printing_sends_stop_code() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.handle_edge(STOP);
        assert_eq!(rig.printer.calls(), vec![cmd("M117 Emergency Stop"), cmd("M112")]);
    }

    #[test]
    fn test_stop_uses_configured_code() {
        let config = ButtonConfig { stop_command: "M410".to_string(), ..both_buttons() };
        let rig = rig(config, PrinterState::Printing);
        rig.dispatcher.handle_edge(STOP);
        assert_eq!(rig.printer.commands(), vec!["M117 Emergency Stop", "M410"]);
    }

    #[test]
    fn test_stop_while_paused_cancels() {
        let rig = rig(both_buttons(), PrinterState::Paused);
        rig.dispatcher.handle_edge(STOP);
        assert_eq!(rig.printer.calls(), vec![cmd("M117 Job cancelled"), PrinterCall::Cancel]);
    }

    #[test]
    fn test_stop_while_idle() {
        let rig = rig(both_buttons(), PrinterState::Unknown);
        rig.dispatcher.handle_edge(STOP);
        assert_eq!(rig.printer.calls(), vec![cmd("M117 STOP button pressed")]);
    }

    #[test]
    fn test_shutdown_mode_while_printing_cancels() {
        let rig = rig(both_buttons().with_stop_mode(StopMode::Shutdown), PrinterState::Printing);
        rig.dispatcher.handle_edge(STOP);
        assert_eq!(rig.printer.calls(), vec![cmd("M117 Job cancelled"), PrinterCall::Cancel]);
    }

    #[test]
    fn test_shutdown_mode_while_paused_runs_sequence_in_order() {
        let rig = rig(both_buttons().with_stop_mode(StopMode::Shutdown), PrinterState::Paused);
        rig.dispatcher.handle_edge(STOP);

        let mut expected: Vec<PrinterCall> =
            default_shutdown_sequence().iter().map(|g| cmd(g)).collect();
        expected.push(cmd("M117 Job cancelled"));
        expected.push(PrinterCall::Cancel);

        assert_eq!(rig.printer.calls(), expected);
        assert_eq!(
            rig.printer.commands(),
            vec![
                "G4",
                "M104 S0",
                "M140 S0",
                "M107",
                "G1 X0 Y200 F3000",
                "M84",
                "M117 Job cancelled"
            ]
        );
    }

    #[test]
    fn test_rejected_commands_do_not_stop_the_sequence() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.printer.set_reject(true);
        rig.dispatcher.handle_edge(STOP);
        assert_eq!(rig.printer.calls(), vec![cmd("M117 Emergency Stop"), cmd("M112")]);
    }

    #[test]
    fn test_unknown_pin_ignored() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.handle_edge(4);
        assert!(rig.printer.calls().is_empty());
        assert_eq!(rig.dispatcher.button_for(4), None);
        assert_eq!(rig.dispatcher.button_for(PAUSE), Some(Button::Pause));
    }

    #[test]
    fn test_edges_dispatch_through_gpio() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.on_start().unwrap();

        assert!(rig.gpio.press(STOP));
        assert_eq!(rig.printer.commands(), vec!["M117 Emergency Stop", "M112"]);
    }

    #[test]
    fn test_debounced_edges_dispatch_once() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.on_start().unwrap();

        let t0 = Instant::now();
        rig.gpio.click_at(PAUSE, t0);
        rig.gpio.click_at(PAUSE, t0 + Duration::from_millis(50));
        rig.gpio.click_at(PAUSE, t0 + Duration::from_millis(399));

        assert_eq!(rig.printer.calls(), vec![PrinterCall::TogglePause, cmd("M117 Printer paused")]);
    }

    #[test]
    fn test_rearm_is_idempotent() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.on_start().unwrap();
        rig.dispatcher.on_print_started().unwrap();
        rig.dispatcher.on_print_started().unwrap();

        assert_eq!(rig.gpio.watch_count(), 2);
        rig.gpio.press(PAUSE);
        assert_eq!(rig.printer.calls().len(), 2);
    }

    #[test]
    fn test_print_end_disarms() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.on_start().unwrap();

        for event in [PrintEvent::PrintDone, PrintEvent::PrintFailed, PrintEvent::PrintCancelled] {
            rig.dispatcher.on_event(PrintEvent::PrintStarted);
            assert_eq!(rig.gpio.watch_count(), 2);
            rig.dispatcher.on_event(event);
            assert_eq!(rig.gpio.watch_count(), 0);
        }

        assert!(!rig.gpio.press(PAUSE));
        assert!(rig.printer.calls().is_empty());
    }

    #[test]
    fn test_disarm_without_watches() {
        let rig = rig(both_buttons(), PrinterState::Ready);
        rig.dispatcher.on_print_ended();
        rig.dispatcher.disarm();
        assert_eq!(rig.gpio.watch_count(), 0);
    }

    #[test]
    fn test_dropped_dispatcher_ignores_late_edges() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.on_start().unwrap();
        let Rig { gpio, printer, dispatcher } = rig;
        drop(dispatcher);

        assert!(gpio.press(PAUSE));
        assert!(printer.calls().is_empty());
    }

    #[test]
    fn test_status_reports_levels() {
        let rig = rig(both_buttons(), PrinterState::Printing);
        rig.dispatcher.on_start().unwrap();

        let status = rig.dispatcher.status();
        assert_eq!(status.pause, PinReading::Released);
        assert_eq!(status.stop, PinReading::Released);
        assert_eq!(status.status, PrinterState::Printing);

        rig.gpio.press(STOP);
        assert_eq!(rig.dispatcher.status().stop, PinReading::Pressed);
    }

    #[test]
    fn test_status_is_side_effect_free() {
        let rig = rig(both_buttons(), PrinterState::Paused);
        rig.dispatcher.on_start().unwrap();
        rig.dispatcher.status();
        assert!(rig.printer.calls().is_empty());
    }

    #[test]
    fn test_status_json() {
        let report = StatusReport {
            pause: PinReading::Disabled,
            stop: PinReading::Pressed,
            status: PrinterState::Ready,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"pause":"-1","stop":"0","status":"ready"}"#);
    }
}
