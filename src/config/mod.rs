//! Configuration management for the subshell host
//!
//! Subshell start-up, pause-after-run policy and pty settings, loaded from
//! TOML or JSON by [`loader::ConfigLoader`]. Every section falls back to its
//! defaults, so a config file only needs the keys it changes.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::PausePolicy;

/// Ctrl-O, returns from an interactive resume to the host
pub const DEFAULT_TOGGLE_KEY: u8 = 0x0f;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Subshell configuration
    pub subshell: SubshellConfig,

    /// Pause-after-run configuration
    pub pause: PauseConfig,

    /// PTY configuration
    pub pty: PtyConfig,
}

/// How the interactive subshell is started and driven
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubshellConfig {
    /// Use a persistent subshell; when false every command runs one-shot
    pub enabled: bool,

    /// Shell executable; `$SHELL` when unset
    pub shell_path: Option<PathBuf>,

    /// Initial working directory of the shell
    pub working_directory: Option<PathBuf>,

    /// Bytes the line discipline echoes for the command terminator.
    /// Read from the pty's termios when unset.
    pub terminator_echo_bytes: Option<usize>,

    /// How long the shell may take to park itself after a prompt report
    pub stop_timeout_ms: u64,

    /// Quiet period used to drain output still in flight at a prompt
    pub settle_ms: u64,

    /// How long to wait for the prompt after the shell is continued
    pub prompt_wait_ms: u64,

    /// How long the shell may take to report its first prompt
    pub startup_timeout_ms: u64,

    /// Grace period between `exit` and `SIGHUP` on shutdown
    pub exit_grace_ms: u64,

    /// Key that returns from an interactive resume
    pub toggle_key: u8,
}

impl Default for SubshellConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shell_path: None,
            working_directory: None,
            terminator_echo_bytes: None,
            stop_timeout_ms: 2000,
            settle_ms: 10,
            prompt_wait_ms: 100,
            startup_timeout_ms: 5000,
            exit_grace_ms: 500,
            toggle_key: DEFAULT_TOGGLE_KEY,
        }
    }
}

/// When to wait for a key press after a command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseConfig {
    /// Pause policy applied after each foreground command
    pub after_run: PausePolicy,
}

/// PTY-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtyConfig {
    /// Terminal dimensions (cols, rows)
    pub dimensions: (u16, u16),

    /// Read buffer size in bytes
    pub buffer_size: usize,

    /// Environment variables to set in the shell
    pub environment: HashMap<String, String>,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            dimensions: (80, 24),
            buffer_size: 4096,
            environment: HashMap::new(),
        }
    }
}

impl Config {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.subshell.shell_path {
            if path.as_os_str().is_empty() {
                return Err(Error::ConfigValidationFailed {
                    field: "subshell.shell_path".to_string(),
                    reason: "Shell path cannot be empty".to_string(),
                });
            }
        }

        if let Some(bytes) = self.subshell.terminator_echo_bytes {
            if !(1..=2).contains(&bytes) {
                return Err(Error::ConfigValidationFailed {
                    field: "subshell.terminator_echo_bytes".to_string(),
                    reason: "Terminator echo must be 1 (LF) or 2 (CR LF) bytes".to_string(),
                });
            }
        }

        if self.subshell.stop_timeout_ms == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "subshell.stop_timeout_ms".to_string(),
                reason: "Stop timeout must be greater than 0".to_string(),
            });
        }

        if self.subshell.stop_timeout_ms > 60_000 {
            return Err(Error::ConfigValidationFailed {
                field: "subshell.stop_timeout_ms".to_string(),
                reason: "Stop timeout cannot exceed 60 seconds".to_string(),
            });
        }

        if self.subshell.startup_timeout_ms == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "subshell.startup_timeout_ms".to_string(),
                reason: "Startup timeout must be greater than 0".to_string(),
            });
        }

        if self.subshell.settle_ms > 1000 {
            return Err(Error::ConfigValidationFailed {
                field: "subshell.settle_ms".to_string(),
                reason: "Settle time cannot exceed 1 second".to_string(),
            });
        }

        // Printable keys would be swallowed from ordinary typing
        if self.subshell.toggle_key >= 0x20 && self.subshell.toggle_key != 0x7f {
            return Err(Error::ConfigValidationFailed {
                field: "subshell.toggle_key".to_string(),
                reason: "Toggle key must be a control character".to_string(),
            });
        }

        let (cols, rows) = self.pty.dimensions;
        if cols == 0 || rows == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "pty.dimensions".to_string(),
                reason: "Terminal dimensions must be non-zero".to_string(),
            });
        }

        if self.pty.buffer_size == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "pty.buffer_size".to_string(),
                reason: "PTY buffer size must be greater than 0".to_string(),
            });
        }

        if self.pty.buffer_size > 10 * 1024 * 1024 {
            return Err(Error::ConfigValidationFailed {
                field: "pty.buffer_size".to_string(),
                reason: "PTY buffer size cannot exceed 10MB".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration utilities
pub mod utils {
    use super::*;

    /// Get configuration file format from path
    pub fn get_config_format(path: &Path) -> Option<loader::ConfigFormat> {
        match path.extension()?.to_str()? {
            "toml" => Some(loader::ConfigFormat::Toml),
            "json" => Some(loader::ConfigFormat::Json),
            _ => None,
        }
    }

    /// Create a default configuration file content
    pub fn create_default_config_content(format: loader::ConfigFormat) -> Result<String> {
        let config = Config::default();

        match format {
            loader::ConfigFormat::Toml => {
                toml::to_string_pretty(&config).map_err(|e| Error::ConfigSerializationFailed {
                    format: "TOML".to_string(),
                    reason: e.to_string(),
                })
            }
            loader::ConfigFormat::Json => {
                serde_json::to_string_pretty(&config).map_err(|e| {
                    Error::ConfigSerializationFailed {
                        format: "JSON".to_string(),
                        reason: e.to_string(),
                    }
                })
            }
        }
    }
}
