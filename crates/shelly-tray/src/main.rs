use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shelly_hotkeys::{Action, ConfigStore, HotkeyMapping};

mod app;
mod commands;
mod tray;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Parser, Debug)]
#[command(name = "shelly-tray")]
#[command(about = "Control Shelly relays with global hotkeys", long_about = None)]
struct Args {
    /// Path to the RON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Set the log level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tray daemon (the default)
    Run,
    /// Show the device and configured hotkeys
    List,
    /// Add a hotkey, replacing any existing one with the same name
    Add {
        #[arg(long)]
        name: String,
        /// Key combination such as "Ctrl+Alt+L"
        #[arg(long)]
        hotkey: String,
        #[arg(long, default_value = "relay/0")]
        endpoint: String,
        /// toggle, on or off
        #[arg(long, default_value = "toggle")]
        action: Action,
    },
    /// Remove a hotkey by name
    Remove { name: String },
    /// Set the device host, e.g. 192.168.1.100 or 192.168.1.100:8080
    SetHost { host: String },
    /// Check that the device answers
    Test,
    /// Send one hotkey's command without pressing it
    Fire { name: String },
    /// Read whether a relay is on
    Status {
        #[arg(default_value = "relay/0")]
        endpoint: String,
    },
    /// Start with the system login
    Autostart {
        #[arg(value_enum)]
        state: Toggle,
    },
}

fn init_tracing(level: LogLevel) -> Result<()> {
    let level = level.as_str();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("shelly_hotkeys={level}").parse()?)
                .add_directive(format!("shelly_tray={level}").parse()?),
        )
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Run);

    // The daemon narrates what it does; one-shot commands only warn.
    let default_level = match command {
        Command::Run => LogLevel::Info,
        _ => LogLevel::Warn,
    };
    init_tracing(args.log_level.unwrap_or(default_level))?;

    let store = match args.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::default_location().context("Failed to locate settings file")?,
    };

    match command {
        Command::Run => app::run(store),
        Command::List => commands::list(&store),
        Command::Add {
            name,
            hotkey,
            endpoint,
            action,
        } => commands::add(&store, HotkeyMapping::new(name, hotkey, endpoint, action)),
        Command::Remove { name } => commands::remove(&store, &name),
        Command::SetHost { host } => commands::set_host(&store, &host),
        Command::Test => commands::test(&store),
        Command::Fire { name } => commands::fire(&store, &name),
        Command::Status { endpoint } => commands::status(&store, &endpoint),
        Command::Autostart { state } => commands::autostart(&store, matches!(state, Toggle::On)),
    }
}
