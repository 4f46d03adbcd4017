//! Pseudoterminal (PTY) Management
//!
//! The subshell lives behind a pty. [`SubshellPty`] is the seam between the
//! session logic and the operating system: the native implementation in
//! [`native`] multiplexes the pty master, the prompt notification FIFO and
//! the host's stdin with `poll(2)`; tests substitute scripted mocks.

pub mod channel;
pub mod native;
pub mod process;
pub mod signals;

use std::io;
use std::time::Duration;

use crate::error::Result;

// Re-exports for convenience
pub use channel::{ChannelStats, ReadOutcome, SubshellChannel};
pub use native::{NativePty, NotifyFifo};
pub use process::{get_default_shell, get_user_shell, spawn_oneshot, spawn_subshell, SpawnConfig};
pub use signals::{Signal, SignalHandler, StopOutcome};

/// Which source became readable first.
///
/// When several are ready at once, pty output wins so that output written
/// before a prompt notification is always accounted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The pty master has bytes
    Output,
    /// The shell reported a prompt
    Notification,
    /// The user typed something on the host terminal
    HostInput,
    /// Nothing arrived before the timeout
    TimedOut,
}

/// Operations the session needs from the pty hosting the shell
pub trait SubshellPty {
    /// Block until a source is readable, or the timeout expires.
    /// `None` waits indefinitely.
    ///
    /// `watch_host_input` adds the host terminal's input to the watched set.
    fn poll(&mut self, timeout: Option<Duration>, watch_host_input: bool) -> Result<Readiness>;

    /// Read from the pty master
    fn read_output(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write to the pty master, possibly partially
    fn write_input(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flush buffered input to the pty master
    fn flush_input(&mut self) -> io::Result<()>;

    /// Take the next prompt notification, the shell's working directory
    fn read_notification(&mut self) -> Result<Option<String>>;

    /// Read keystrokes from the host terminal
    fn read_host_input(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Whether the shell process is still alive; records its exit code if not
    fn child_alive(&mut self) -> bool;

    /// Exit code of the shell, once it is known
    fn exit_code(&self) -> Option<i32>;

    /// Block until the shell has stopped itself after reporting a prompt
    fn wait_for_stop(&mut self) -> Result<()>;

    /// Let a stopped shell continue
    fn continue_shell(&mut self) -> Result<()>;

    /// Send a signal to the shell
    fn signal(&mut self, signal: Signal) -> Result<()>;

    /// How many bytes the line discipline echoes for a written `\n`, if the
    /// terminal settings can be read
    fn terminator_echo_len(&self) -> Option<usize>;
}
