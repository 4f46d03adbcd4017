//! Host Terminal
//!
//! The terminal the application itself runs on. The session only needs a
//! narrow slice of it: switching into a transparent mode while the shell
//! owns the screen, writing the shell's output through, asking what kind of
//! terminal it is, and waiting for a key press when a pause is due.

pub mod capabilities;
pub mod host;

pub use capabilities::{
    capabilities_for, detect_capabilities, is_capable_terminal_name, is_console_device,
};
pub use host::HostTty;

use crate::error::Result;

/// What the host terminal can do to show subshell output after the fact.
///
/// A capable terminal (xterm and relatives) or an attached Linux console can
/// bring the shell's output back on demand, so a pause is not needed there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalCapabilities {
    /// `TERM` names an xterm-like terminal
    pub capable_terminal: bool,
    /// Running on a Linux virtual console
    pub console_attached: bool,
}

impl TerminalCapabilities {
    pub fn new(capable_terminal: bool, console_attached: bool) -> Self {
        Self {
            capable_terminal,
            console_attached,
        }
    }

    /// Neither a capable terminal nor a console
    pub fn is_dumb(&self) -> bool {
        !self.capable_terminal && !self.console_attached
    }
}

/// Operations the session performs on the host terminal
pub trait HostTerminal {
    /// Hand the keyboard and screen to the shell: raw input, no local echo
    fn enter_transparent_mode(&mut self) -> Result<()>;

    /// Undo [`HostTerminal::enter_transparent_mode`]
    fn restore_mode(&mut self) -> Result<()>;

    fn capabilities(&self) -> TerminalCapabilities;

    /// Show bytes the shell produced
    fn write_output(&mut self, data: &[u8]) -> Result<()>;

    /// Block until the user acknowledges the output
    fn wait_for_acknowledgment(&mut self) -> Result<()>;
}
