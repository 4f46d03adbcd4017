//! Host TTY
//!
//! [`HostTerminal`] over the process's own stdin/stdout. Transparent mode is
//! `cfmakeraw` on stdin; the original termios is restored afterwards and
//! again on drop.

use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, Termios};
use nix::unistd::isatty;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;

use super::{capabilities::detect_capabilities, HostTerminal, TerminalCapabilities};
use crate::error::{Error, Result};

const PAUSE_MESSAGE: &[u8] = b"\r\nPress any key to continue...";

/// The terminal this process is attached to
pub struct HostTty {
    stdin: File,
    stdout: io::Stdout,
    saved: Option<Termios>,
    interactive: bool,
    capabilities: TerminalCapabilities,
}

impl HostTty {
    pub fn new() -> Result<Self> {
        // Unbuffered so no keystroke sits in a userspace buffer
        let stdin = File::from(io::stdin().as_fd().try_clone_to_owned()?);
        let interactive = isatty(stdin.as_fd()).unwrap_or(false);
        Ok(Self {
            stdin,
            stdout: io::stdout(),
            saved: None,
            interactive,
            capabilities: detect_capabilities(),
        })
    }

    /// Whether stdin is a terminal; raw mode and pauses need one
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn is_transparent(&self) -> bool {
        self.saved.is_some()
    }

    fn set_attributes(&self, termios: &Termios) -> Result<()> {
        tcsetattr(self.stdin.as_fd(), SetArg::TCSADRAIN, termios).map_err(|e| {
            Error::TerminalModeFailed {
                reason: e.to_string(),
            }
        })
    }
}

impl HostTerminal for HostTty {
    fn enter_transparent_mode(&mut self) -> Result<()> {
        if !self.interactive || self.saved.is_some() {
            return Ok(());
        }

        let original = tcgetattr(self.stdin.as_fd()).map_err(|e| Error::TerminalModeFailed {
            reason: e.to_string(),
        })?;
        let mut raw = original.clone();
        cfmakeraw(&mut raw);
        self.set_attributes(&raw)?;
        self.saved = Some(original);
        debug!("Host terminal in transparent mode");
        Ok(())
    }

    fn restore_mode(&mut self) -> Result<()> {
        if let Some(original) = self.saved.take() {
            self.set_attributes(&original)?;
            debug!("Host terminal mode restored");
        }
        Ok(())
    }

    fn capabilities(&self) -> TerminalCapabilities {
        self.capabilities
    }

    fn write_output(&mut self, data: &[u8]) -> Result<()> {
        let mut out = self.stdout.lock();
        out.write_all(data)?;
        out.flush()?;
        Ok(())
    }

    fn wait_for_acknowledgment(&mut self) -> Result<()> {
        if !self.interactive {
            return Ok(());
        }

        self.write_output(PAUSE_MESSAGE)?;
        let entered = !self.is_transparent();
        self.enter_transparent_mode()?;

        let mut key = [0u8; 16];
        let result = loop {
            match self.stdin.read(&mut key) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        if entered {
            self.restore_mode()?;
        }
        self.write_output(b"\r\n")?;
        result?;
        Ok(())
    }
}

impl Drop for HostTty {
    fn drop(&mut self) {
        if let Err(e) = self.restore_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}
