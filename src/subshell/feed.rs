//! Feed loop
//!
//! Moves bytes between the shell and the host terminal until the shell hands
//! control back. Every read from the pty is counted, except the prompt the
//! shell prints after it has been let go again.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::{OutputByteCount, SubshellSession};
use crate::error::{Error, Result};
use crate::models::{InvocationMode, SubshellState};
use crate::pty::{ReadOutcome, Readiness, SubshellPty};
use crate::terminal::{HostTerminal, TerminalCapabilities};

/// What the loop is feeding for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Waiting for the first prompt after spawning
    Startup,
    /// A dispatched command is running
    Command { mode: InvocationMode },
    /// The user has the shell until the toggle key
    Resume,
}

impl FeedMode {
    fn shows_output(&self) -> bool {
        match self {
            FeedMode::Startup => false,
            FeedMode::Command { mode } => mode.shows_output(),
            FeedMode::Resume => true,
        }
    }

    fn forwards_keys(&self) -> bool {
        match self {
            FeedMode::Startup => false,
            FeedMode::Command { mode } => mode.shows_output(),
            FeedMode::Resume => true,
        }
    }
}

/// Why the loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedExit {
    /// The shell finished and is at its prompt
    Prompt,
    /// The user pressed the toggle key, or the host input closed
    Toggled,
}

/// Host terminal that drops everything, used before any host is involved
pub(super) struct Discard;

impl HostTerminal for Discard {
    fn enter_transparent_mode(&mut self) -> Result<()> {
        Ok(())
    }

    fn restore_mode(&mut self) -> Result<()> {
        Ok(())
    }

    fn capabilities(&self) -> TerminalCapabilities {
        TerminalCapabilities::default()
    }

    fn write_output(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn wait_for_acknowledgment(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<P: SubshellPty> SubshellSession<P> {
    pub(super) fn feed<T: HostTerminal + ?Sized>(
        &mut self,
        mode: FeedMode,
        host: &mut T,
    ) -> Result<FeedExit> {
        let deadline = Instant::now() + self.settings.startup_timeout;

        loop {
            let timeout = match mode {
                FeedMode::Startup => Some(deadline.saturating_duration_since(Instant::now())),
                _ => None,
            };

            match self.channel.pty_mut().poll(timeout, mode.forwards_keys())? {
                Readiness::Output => self.pump_output(mode.shows_output(), host)?,
                Readiness::Notification => {
                    if let Some(cwd) = self.channel.pty_mut().read_notification()? {
                        if self.on_prompt(cwd, mode, host)? {
                            return Ok(FeedExit::Prompt);
                        }
                    }
                }
                Readiness::HostInput => {
                    if self.forward_host_input()? {
                        return Ok(FeedExit::Toggled);
                    }
                }
                Readiness::TimedOut => {
                    if mode == FeedMode::Startup && Instant::now() >= deadline {
                        return Err(Error::PromptTimeout {
                            timeout: self.settings.startup_timeout,
                        });
                    }
                }
            }
        }
    }

    /// One read from the pty, counted and optionally shown
    fn pump_output<T: HostTerminal + ?Sized>(&mut self, show: bool, host: &mut T) -> Result<()> {
        let end_of_file = match self.channel.read_available(&mut self.counter)? {
            ReadOutcome::Data(data) => {
                if show {
                    host.write_output(data)?;
                }
                false
            }
            ReadOutcome::EndOfFile => true,
        };

        if end_of_file {
            return Err(self.end_of_file());
        }
        Ok(())
    }

    /// The shell reported a prompt and stopped itself.
    ///
    /// Returns whether this ends the feed: it does when a command finished
    /// or on start-up, not when the user is typing into an idle shell.
    fn on_prompt<T: HostTerminal + ?Sized>(
        &mut self,
        cwd: String,
        mode: FeedMode,
        host: &mut T,
    ) -> Result<bool> {
        self.channel.pty_mut().wait_for_stop()?;
        self.process.mark_stopped();

        // Output still in flight belongs to the command
        self.drain(mode.shows_output(), host)?;

        self.cwd = Some(PathBuf::from(cwd));
        self.ready = true;
        let finished = self.state != SubshellState::Active;
        self.state = SubshellState::Active;

        self.channel.pty_mut().continue_shell()?;
        self.process.mark_continued();

        // Only the user at the keyboard needs to see the prompt now
        self.capture_prompt(mode == FeedMode::Resume, host)?;
        trace!("Prompt {:?} in {:?}", self.prompt, self.cwd);
        Ok(finished)
    }

    /// Read until the pty has been quiet for the settle period
    fn drain<T: HostTerminal + ?Sized>(&mut self, show: bool, host: &mut T) -> Result<()> {
        while self.channel.pty_mut().poll(Some(self.settings.settle), false)? == Readiness::Output
        {
            self.pump_output(show, host)?;
        }
        Ok(())
    }

    /// Collect the prompt without counting it
    fn capture_prompt<T: HostTerminal + ?Sized>(&mut self, show: bool, host: &mut T) -> Result<()> {
        self.prompt.clear();
        let mut uncounted = OutputByteCount::new();
        let mut wait: Duration = self.settings.prompt_wait;

        while self.channel.pty_mut().poll(Some(wait), false)? == Readiness::Output {
            let end_of_file = match self.channel.read_available(&mut uncounted)? {
                ReadOutcome::Data(data) => {
                    self.prompt.push_str(&String::from_utf8_lossy(data));
                    if show {
                        host.write_output(data)?;
                    }
                    false
                }
                ReadOutcome::EndOfFile => true,
            };
            if end_of_file {
                return Err(self.end_of_file());
            }
            wait = self.settings.settle;
        }
        Ok(())
    }

    /// Pass keystrokes to the shell. Returns true on the toggle key.
    fn forward_host_input(&mut self) -> Result<bool> {
        let mut keys = [0u8; 256];
        let n = match self.channel.pty_mut().read_host_input(&mut keys) {
            Ok(0) => {
                debug!("Host input closed");
                return Ok(true);
            }
            Ok(n) => n,
            Err(e)
                if e.kind() == io::ErrorKind::Interrupted
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                return Ok(false)
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let keys = &keys[..n];
        match keys.iter().position(|b| *b == self.settings.toggle_key) {
            Some(toggle) => {
                if toggle > 0 {
                    self.channel.write_all(&keys[..toggle])?;
                }
                debug!("Toggle key pressed, returning to host");
                Ok(true)
            }
            None => {
                self.channel.write_all(keys)?;
                Ok(false)
            }
        }
    }
}
