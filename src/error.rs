//! Error types and Result aliases for the subshell host

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for subshell host operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the subshell host
#[derive(Debug, Error)]
pub enum Error {
    // === PTY-related errors ===
    /// Failed to create PTY
    #[error("Failed to create PTY for '{command}': {reason}")]
    PtyCreationFailed { command: String, reason: String },

    /// Failed to spawn the shell in the PTY
    #[error("Failed to spawn '{command}': {reason}")]
    CommandSpawnFailed { command: String, reason: String },

    /// Failed to clone PTY reader
    #[error("Failed to clone PTY reader: {reason}")]
    PtyReaderCloneFailed { reason: String },

    /// Failed to take PTY writer
    #[error("Failed to take PTY writer: {reason}")]
    PtyWriterTakeFailed { reason: String },

    /// Failed to read from PTY
    #[error("Failed to read from PTY: {reason}")]
    PtyReadFailed { reason: String },

    /// Failed to write to PTY
    #[error("Failed to write to PTY after {written} of {requested} bytes: {reason}")]
    PtyWriteFailed {
        written: usize,
        requested: usize,
        reason: String,
    },

    /// Waiting for PTY readiness failed
    #[error("Failed to wait for PTY readiness: {reason}")]
    PtyPollFailed { reason: String },

    /// Prompt notification channel could not be created or read
    #[error("Prompt notification channel '{}' failed: {reason}", path.display())]
    NotificationChannelFailed { path: PathBuf, reason: String },

    // === Subshell lifecycle errors ===
    /// The shell process exited while the session was using it
    #[error("The subshell has died{}", describe_exit(exit_code))]
    SubshellDied { exit_code: Option<i32> },

    /// Operation requires a started subshell
    #[error("Subshell is not running (state: {state})")]
    SubshellNotRunning { state: String },

    /// Shell did not report a prompt in time
    #[error("Subshell did not report a prompt within {timeout:?}")]
    PromptTimeout { timeout: Duration },

    /// Failed to send signal to the shell process
    #[error("Failed to send signal '{signal}': {reason}")]
    SignalSendFailed { signal: String, reason: String },

    /// No PID available for the shell process
    #[error("No PID available for the subshell")]
    NoPidAvailable,

    // === Command errors ===
    /// Command validation failed
    #[error("Command validation failed for '{command}': {reason}")]
    CommandValidationFailed { command: String, reason: String },

    // === Host terminal errors ===
    /// Failed to switch the controlling terminal mode
    #[error("Failed to change terminal mode: {reason}")]
    TerminalModeFailed { reason: String },

    // === Configuration errors ===
    /// Failed to load configuration file
    #[error("Failed to load config from '{}': {reason}", path.display())]
    ConfigLoadFailed { path: PathBuf, reason: String },

    /// Configuration file not found
    #[error("Configuration file not found")]
    ConfigNotFound,

    /// Configuration validation failed
    #[error("Configuration validation failed for '{field}': {reason}")]
    ConfigValidationFailed { field: String, reason: String },

    /// Failed to serialize configuration
    #[error("Failed to serialize config as {format}: {reason}")]
    ConfigSerializationFailed { format: String, reason: String },

    /// Failed to parse configuration
    #[error("Failed to parse {format} config: {reason}")]
    ConfigParseFailed { format: String, reason: String },

    /// Unknown pause policy name or index
    #[error("Unknown pause policy: '{value}'")]
    UnknownPausePolicy { value: String },

    // === I/O and system errors ===
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System call errors
    #[error("System error: {0}")]
    Nix(#[from] nix::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    // === Generic fallback (use sparingly) ===
    /// Generic errors
    #[error("Error: {0}")]
    Other(String),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    }
}

impl Error {
    /// Whether the error ends the subshell session.
    ///
    /// The controlling application must tear the session down and fall back
    /// to non-interactive execution when this returns `true`.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(
            self,
            Error::CommandValidationFailed { .. }
                | Error::ConfigLoadFailed { .. }
                | Error::ConfigNotFound
                | Error::ConfigValidationFailed { .. }
                | Error::ConfigSerializationFailed { .. }
                | Error::ConfigParseFailed { .. }
                | Error::UnknownPausePolicy { .. }
                | Error::Serde(_)
                | Error::Toml(_)
        )
    }

    /// Whether the error reports that the shell process is gone
    pub fn is_subshell_death(&self) -> bool {
        matches!(self, Error::SubshellDied { .. })
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
