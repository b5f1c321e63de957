//! Daemon lifecycle management.
//!
//! This module contains the `App` struct that owns the dispatcher and
//! coordinates the background threads: the print monitor and the status
//! endpoint.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::api::StatusServer;
use crate::core::{
    ButtonConfig, ButtonDispatcher, ButtonsError, ButtonsResult, Config, GpioBackend,
};
use crate::gpio::{FakeGpio, Gpio};
use crate::printer::{PrintMonitor, PrinterControl};

/// Running daemon state.
///
/// Created with [`App::new`], started with [`App::start`] and torn down with
/// [`App::stop`]. Stopping is also triggered by setting the flag returned by
/// [`App::shutdown_flag`].
pub struct App {
    /// Application configuration
    pub config: Config,

    dispatcher: Arc<ButtonDispatcher>,
    printer: Arc<dyn PrinterControl>,
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    status_addr: Option<SocketAddr>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("dispatcher", &self.dispatcher)
            .field("threads", &self.threads.len())
            .field("status_addr", &self.status_addr)
            .finish()
    }
}

impl App {
    /// Build the daemon around the given capabilities.
    pub fn new(
        config: Config,
        gpio: Arc<dyn Gpio>,
        printer: Arc<dyn PrinterControl>,
    ) -> ButtonsResult<Self> {
        let buttons = ButtonConfig::from_settings(&config.buttons)?;
        let dispatcher = ButtonDispatcher::new(buttons, gpio, Arc::clone(&printer));

        Ok(Self {
            config,
            dispatcher,
            printer,
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            status_addr: None,
        })
    }

    /// Build the daemon with the capabilities named in `config`.
    pub fn from_config(config: Config) -> ButtonsResult<Self> {
        let gpio = build_gpio(&config)?;
        let printer = build_printer(&config)?;
        Self::new(config, gpio, printer)
    }

    pub fn dispatcher(&self) -> &Arc<ButtonDispatcher> {
        &self.dispatcher
    }

    /// Flag that stops the background threads once set.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Address of the status endpoint, once started.
    pub fn status_addr(&self) -> Option<SocketAddr> {
        self.status_addr
    }

    /// Set up the buttons and start the monitor and status threads.
    ///
    /// The status endpoint is bound first, so a failed start leaves no
    /// button armed and no thread running.
    pub fn start(&mut self) -> ButtonsResult<()> {
        let server = if self.config.server.enabled {
            let server =
                StatusServer::bind(&self.config.server.bind_addr(), Arc::clone(&self.dispatcher))
                    .map_err(|e| ButtonsError::Server(e.to_string()))?;
            Some(server)
        } else {
            None
        };

        self.dispatcher.on_start()?;

        let monitor =
            PrintMonitor::new(Arc::clone(&self.printer), self.config.octoprint.poll_interval());
        let dispatcher = Arc::clone(&self.dispatcher);
        self.threads.push(monitor.spawn(self.shutdown_flag(), move |event| {
            dispatcher.on_event(event);
        }));

        if let Some(server) = server {
            self.status_addr = server.local_addr();
            self.threads.push(server.spawn(self.shutdown_flag()));
        }

        tracing::info!("printbuttons {} started", crate::VERSION);
        Ok(())
    }

    /// Stop the background threads and release the buttons.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Background thread panicked");
            }
        }
        self.dispatcher.disarm();
        tracing::info!("printbuttons stopped");
    }
}

/// GPIO backend selected by `[gpio] backend`.
pub fn build_gpio(config: &Config) -> ButtonsResult<Arc<dyn Gpio>> {
    match config.gpio.backend {
        GpioBackend::Fake => {
            tracing::warn!("Using simulated GPIO, physical buttons will not work");
            Ok(Arc::new(FakeGpio::new()))
        }
        #[cfg(feature = "rpi")]
        GpioBackend::Rppal => Ok(Arc::new(crate::gpio::RppalGpio::new(config.gpio.numbering)?)),
        #[cfg(not(feature = "rpi"))]
        GpioBackend::Rppal => Err(ButtonsError::Config(
            "the rppal GPIO backend requires building with the `rpi` feature".to_string(),
        )),
    }
}

/// Printer client for `[octoprint]`.
pub fn build_printer(config: &Config) -> ButtonsResult<Arc<dyn PrinterControl>> {
    #[cfg(feature = "octoprint")]
    {
        if config.octoprint.api_key.is_empty() {
            tracing::warn!("No OctoPrint API key configured, commands will be rejected");
        }
        Ok(Arc::new(crate::printer::OctoPrintClient::new(&config.octoprint)?))
    }
    #[cfg(not(feature = "octoprint"))]
    {
        let _ = config;
        Err(ButtonsError::Config(
            "printer control requires building with the `octoprint` feature".to_string(),
        ))
    }
}
