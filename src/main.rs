//! printbuttons - physical buttons for your 3D printer.
//!
//! Runs as a daemon next to OctoPrint, turning GPIO button presses into
//! pause, resume, emergency stop and cancel requests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use printbuttons::core::GpioBackend;
use printbuttons::{App, Config};

/// Physical push-buttons to pause and cancel 3D prints
#[derive(Parser)]
#[command(name = "printbuttons")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default lookup
    #[arg(short, long, global = true, env = "PRINTBUTTONS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the button daemon (default)
    Run {
        /// Use simulated GPIO instead of real hardware
        #[arg(long)]
        fake_gpio: bool,
    },

    /// Print button levels and printer state once
    Status {
        /// Use simulated GPIO instead of real hardware
        #[arg(long)]
        fake_gpio: bool,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    // Handle commands
    match cli.command {
        None => cmd_run(cli.config.as_deref(), false)?,
        Some(Commands::Run { fake_gpio }) => cmd_run(cli.config.as_deref(), fake_gpio)?,
        Some(Commands::Status { fake_gpio }) => cmd_status(cli.config.as_deref(), fake_gpio)?,
        Some(Commands::Config { path }) => cmd_config(cli.config.as_deref(), path)?,
        Some(Commands::Completions { shell }) => cmd_completions(shell),
    }

    Ok(())
}

/// Load configuration from `path` or the default lookup, then apply `.env`
/// and environment overrides.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let _ = dotenvy::dotenv();

    let mut config = match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    config.apply_env();
    Ok(config)
}

/// Run the daemon until interrupted.
fn cmd_run(path: Option<&Path>, fake_gpio: bool) -> Result<()> {
    let mut config = load_config(path)?;
    if fake_gpio {
        config.gpio.backend = GpioBackend::Fake;
    }

    let mut app = App::from_config(config).context("Failed to set up buttons")?;
    let shutdown = app.shutdown_flag();
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    app.start().context("Failed to start")?;

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    tracing::info!("Shutting down");
    app.stop();
    Ok(())
}

/// Print a single status report as JSON.
fn cmd_status(path: Option<&Path>, fake_gpio: bool) -> Result<()> {
    let mut config = load_config(path)?;
    if fake_gpio {
        config.gpio.backend = GpioBackend::Fake;
    }
    config.buttons.arm_on_startup = false;

    let app = App::from_config(config).context("Failed to set up buttons")?;
    app.dispatcher().on_start().context("Failed to set up buttons")?;

    let report = app.dispatcher().status();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Show the effective configuration, or where it is read from.
fn cmd_config(path: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        let located = path
            .map(Path::to_path_buf)
            .or_else(Config::locate)
            .or_else(|| Config::config_dir().map(|dir| dir.join("config.toml")));
        if let Some(located) = located {
            println!("{}", located.display());
        }
        return Ok(());
    }

    let config = load_config(path)?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "printbuttons", &mut io::stdout());
}
