//! Command dispatch
//!
//! Writes a command, or the wake-up for a resume, to the shell and subtracts
//! from the counter exactly the bytes the shell will echo back for it.

use super::counter::OutputByteCount;
use crate::error::{Error, Result};
use crate::models::InvocationMode;
use crate::pty::{SubshellChannel, SubshellPty};

/// Written to an idle shell on resume so it redraws its prompt line
pub const WAKE_SEQUENCE: &[u8] = b" \x08";

/// Leading space that keeps quiet commands out of the shell history
pub const QUIET_PREFIX: &[u8] = b" ";

pub const COMMAND_TERMINATOR: &[u8] = b"\n";

/// Bytes echoed for the terminator when nothing better is known (CR LF)
pub const DEFAULT_TERMINATOR_ECHO: usize = 2;

/// What a dispatch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A command was sent; the shell is now running it
    Command,
    /// Empty command: nothing runs, the user is handed the shell
    Resume { woke: bool },
}

impl Dispatched {
    pub fn is_command(&self) -> bool {
        matches!(self, Dispatched::Command)
    }
}

/// Terminator echo length: configured value, then the pty's line
/// discipline, then [`DEFAULT_TERMINATOR_ECHO`]
pub fn resolve_terminator_echo(configured: Option<usize>, detected: Option<usize>) -> usize {
    configured.or(detected).unwrap_or(DEFAULT_TERMINATOR_ECHO)
}

/// Reject commands the shell would treat as several lines
pub fn validate_command(command: &str) -> Result<()> {
    if command.contains(|c: char| c == '\n' || c == '\r') {
        return Err(Error::CommandValidationFailed {
            command: command.to_string(),
            reason: "command must be a single line".to_string(),
        });
    }
    Ok(())
}

/// Whether `command` means "resume the shell" rather than "run something"
pub fn is_resume(command: &str) -> bool {
    command.trim().is_empty()
}

/// Send `command` to the shell.
///
/// The counter must already have been reset for this cycle. `ready` says
/// whether the shell is idle at its prompt, which is the only case where the
/// wake sequence is written.
pub fn dispatch<P: SubshellPty>(
    channel: &mut SubshellChannel<P>,
    counter: &mut OutputByteCount,
    command: &str,
    mode: InvocationMode,
    ready: bool,
    terminator_echo: usize,
) -> Result<Dispatched> {
    validate_command(command)?;

    if is_resume(command) {
        if !ready {
            return Ok(Dispatched::Resume { woke: false });
        }
        let written = channel.write_all(WAKE_SEQUENCE)?;
        counter.subtract_written(written);
        return Ok(Dispatched::Resume { woke: true });
    }

    if mode == InvocationMode::Quietly {
        let written = channel.write_all(QUIET_PREFIX)?;
        counter.subtract_written(written);
    }

    let written = channel.write_all(command.as_bytes())?;
    counter.subtract_written(written);

    channel.write_all(COMMAND_TERMINATOR)?;
    counter.subtract_written(terminator_echo);

    debug!(
        "Dispatched {} bytes ({:?}), counter at {}",
        command.len(),
        mode,
        counter.value()
    );
    Ok(Dispatched::Command)
}
