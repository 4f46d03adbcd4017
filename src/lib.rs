//! subshell-host - an interactive shell hosted behind a full-screen application
//!
//! A visual file manager keeps a real shell running in a pseudoterminal so
//! that commands typed at its command line run with the user's own shell,
//! aliases and history. After each command the application has to repaint
//! its panels, which hides whatever the command printed. This crate decides
//! when the user should get a "Press any key" pause first.
//!
//! ## How output is detected
//!
//! Every byte read from the shell's pty is counted. Everything the host
//! writes that the shell echoes back (the command text, its terminator, the
//! resume wake-up) is subtracted. When the shell reports its prompt again,
//! a positive count means the command printed something of its own.
//!
//! ## Module Organization
//!
//! - [`subshell`] - Session lifecycle, byte accounting, dispatch, feed loop
//! - [`pause`] - Pause-after-run policy decisions
//! - [`pty`] - PTY spawning, signal handling, the read/write channel
//! - [`terminal`] - The host terminal: transparent mode, capabilities, pauses
//! - [`execution`] - One-shot execution when no subshell is available
//! - [`config`] - Configuration loading and validation
//! - [`models`] - Pause policies, shell flavours, process records
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use subshell_host::{init, start_session, HostTty, InvocationMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = init()?;
//! let mut session = start_session(&config)?;
//! let mut host = HostTty::new()?;
//!
//! let report = session.run_command("ls", InvocationMode::RunUserCommand, &mut host)?;
//! println!("{} bytes of output, paused: {}", report.output_bytes, report.paused());
//! session.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! One foreground thread drives everything. The only place it blocks is
//! `poll(2)` over the pty master, the prompt notification FIFO and the host's
//! stdin; pty output always wins over a prompt notification.

#![allow(unexpected_cfgs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod pause;
pub mod pty;
pub mod subshell;
pub mod terminal;

// Re-exports for core functionality
pub use config::loader::ConfigLoader;
pub use config::Config;
pub use error::{Error, Result};
pub use execution::FallbackExecutor;
pub use models::{InvocationMode, PausePolicy, ShellType, SubshellState};
pub use pause::{PauseContext, PauseDecision};
pub use pty::{NativePty, SpawnConfig, SubshellPty};
pub use subshell::{CommandReport, OutputByteCount, SessionSettings, SubshellSession};
pub use terminal::{HostTerminal, HostTty, TerminalCapabilities};

/// A session over a real pseudoterminal
pub type NativeSession = SubshellSession<NativePty>;

/// The current version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The application name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The application description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Load the configuration from the default locations.
///
/// A broken or missing configuration is not fatal here: the defaults are
/// used and a warning is logged.
pub fn init() -> Result<Config> {
    info!("Initializing {} v{}", NAME, VERSION);

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load configuration: {}. Using defaults", e);
            Config::default()
        }
    };

    if std::env::var("HOME").is_err() {
        warn!("HOME environment variable not set");
    }

    Ok(config)
}

/// Load the configuration from an explicit file; errors are fatal
pub fn init_with_config(config_path: &std::path::Path) -> Result<Config> {
    info!(
        "Initializing {} v{} with config: {}",
        NAME,
        VERSION,
        config_path.display()
    );
    ConfigLoader::load_from_path(config_path, true)
}

/// Spawn the configured shell and wait for its first prompt
pub fn start_session(config: &Config) -> Result<NativeSession> {
    let spawn_config = SpawnConfig::from_config(config);
    let (pty, process) = pty::spawn_subshell(&spawn_config)?;
    let mut session = SubshellSession::new(pty, process, SessionSettings::from_config(config));
    session.start()?;
    Ok(session)
}

/// User-facing description of a start-up failure
pub fn handle_startup_error(error: &Error) -> String {
    match error {
        Error::ConfigLoadFailed { path, reason } => {
            format!(
                "Configuration Error: Failed to load config from '{}': {}\n\nTry:\n• Check the path and file permissions\n• Run without --config to use the defaults",
                path.display(),
                reason
            )
        }
        Error::ConfigParseFailed { format, reason } => {
            format!(
                "Configuration Error: Failed to parse {} config: {}\n\nTry:\n• Check configuration file syntax",
                format, reason
            )
        }
        Error::ConfigValidationFailed { field, reason } => {
            format!(
                "Configuration Error: Validation failed for '{}': {}",
                field, reason
            )
        }
        Error::UnknownPausePolicy { value } => {
            format!(
                "Unknown pause policy '{}'. Use one of: never, on_dumb_terminals, always, on_output_only",
                value
            )
        }
        Error::CommandSpawnFailed { command, reason } | Error::PtyCreationFailed { command, reason } => {
            format!(
                "Subshell Error: Could not start '{}': {}\n\nTry:\n• Set subshell.shell_path to bash, zsh or fish\n• Use --no-subshell",
                command, reason
            )
        }
        _ => {
            format!(
                "Unexpected Error: {}\n\nPlease report this issue with debug logs enabled",
                error
            )
        }
    }
}
