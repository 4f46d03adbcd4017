//! Subshell Session
//!
//! Owns one hosted shell and drives its command cycle:
//!
//! 1. reset the [`OutputByteCount`] and hand the host terminal to the shell,
//! 2. [`dispatcher::dispatch`] the command, subtracting what will be echoed,
//! 3. feed bytes both ways until the shell reports its prompt again,
//! 4. ask [`crate::pause`] whether the user should see the output first.
//!
//! Prompt reports arrive on a notification FIFO. The prompt hook stops the
//! shell right after writing to it, which lets the session drain every byte
//! of command output before it lets the shell print its prompt.

pub mod counter;
pub mod dispatcher;
pub mod feed;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{InvocationMode, PausePolicy, SubshellProcess, SubshellState};
use crate::pause::{self, PauseContext, PauseDecision};
use crate::pty::{ChannelStats, ReadOutcome, Signal, SubshellChannel, SubshellPty};
use crate::terminal::{HostTerminal, TerminalCapabilities};

pub use counter::OutputByteCount;
pub use dispatcher::{resolve_terminator_echo, Dispatched};
pub use feed::{FeedExit, FeedMode};

/// Sent to an idle shell on shutdown; the leading space keeps it out of history
const EXIT_COMMAND: &[u8] = b" exit\n";

/// How often shutdown and death checks look at the child
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long an end-of-file may precede the child's exit status
const DEATH_CONFIRM_TIMEOUT: Duration = Duration::from_millis(200);

/// Timing and policy knobs for a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub pause_policy: PausePolicy,
    /// Overrides the terminator echo read from the pty
    pub terminator_echo: Option<usize>,
    /// Quiet period that ends a drain
    pub settle: Duration,
    /// How long to wait for the first prompt byte after continuing the shell
    pub prompt_wait: Duration,
    /// How long the shell may take to report its first prompt
    pub startup_timeout: Duration,
    /// Grace period between `exit` and `SIGHUP`
    pub exit_grace: Duration,
    /// Key that hands control back from the shell
    pub toggle_key: u8,
    pub buffer_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pause_policy: config.pause.after_run,
            terminator_echo: config.subshell.terminator_echo_bytes,
            settle: Duration::from_millis(config.subshell.settle_ms),
            prompt_wait: Duration::from_millis(config.subshell.prompt_wait_ms),
            startup_timeout: Duration::from_millis(config.subshell.startup_timeout_ms),
            exit_grace: Duration::from_millis(config.subshell.exit_grace_ms),
            toggle_key: config.subshell.toggle_key,
            buffer_size: config.pty.buffer_size,
        }
    }
}

/// Outcome of one command run
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReport {
    pub command: String,
    pub mode: InvocationMode,
    /// Bytes the command produced, after echo was subtracted
    pub output_bytes: i64,
    pub decision: PauseDecision,
    /// The shell came back to its prompt; false when the user took control
    /// back while the command was still running
    pub completed: bool,
    /// Shell working directory after the command
    pub cwd: Option<PathBuf>,
    /// Prompt the shell printed afterwards
    pub prompt: String,
    /// Exit status, for commands run outside the subshell
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CommandReport {
    pub fn paused(&self) -> bool {
        self.decision.should_pause()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// An interactive shell hosted on a pty
pub struct SubshellSession<P: SubshellPty> {
    id: Uuid,
    channel: SubshellChannel<P>,
    counter: OutputByteCount,
    state: SubshellState,
    /// Idle at its prompt and waiting for input
    ready: bool,
    quitting: bool,
    cwd: Option<PathBuf>,
    prompt: String,
    process: SubshellProcess,
    settings: SessionSettings,
    terminator_echo: usize,
}

impl<P: SubshellPty> SubshellSession<P> {
    pub fn new(pty: P, process: SubshellProcess, settings: SessionSettings) -> Self {
        let terminator_echo =
            resolve_terminator_echo(settings.terminator_echo, pty.terminator_echo_len());
        let id = Uuid::new_v4();
        debug!(
            "Session {} for {} (terminator echo {} bytes)",
            id, process, terminator_echo
        );

        Self {
            id,
            channel: SubshellChannel::with_buffer_size(pty, settings.buffer_size),
            counter: OutputByteCount::new(),
            state: SubshellState::Inactive,
            ready: false,
            quitting: false,
            cwd: None,
            prompt: String::new(),
            process,
            settings,
            terminator_echo,
        }
    }

    /// Wait for the shell's first prompt; `Inactive` becomes `Active`
    pub fn start(&mut self) -> Result<()> {
        if self.state != SubshellState::Inactive {
            return Ok(());
        }

        let started = Instant::now();
        match self.feed(FeedMode::Startup, &mut feed::Discard) {
            Ok(_) => {
                info!(
                    "Subshell ready in {:?}, cwd {:?}",
                    started.elapsed(),
                    self.cwd
                );
                Ok(())
            }
            Err(e) => Err(self.note_failure(e)),
        }
    }

    /// Run `command` in the shell and decide whether to pause afterwards.
    ///
    /// An empty command resumes the shell interactively instead: keystrokes
    /// go to the shell until the toggle key, and no pause is considered.
    pub fn run_command<T: HostTerminal + ?Sized>(
        &mut self,
        command: &str,
        mode: InvocationMode,
        host: &mut T,
    ) -> Result<CommandReport> {
        self.ensure_started()?;
        dispatcher::validate_command(command)?;

        let resume = dispatcher::is_resume(command);
        if !resume && self.state.is_running_command() {
            return Err(Error::CommandValidationFailed {
                command: command.to_string(),
                reason: "the subshell is still running a command".to_string(),
            });
        }

        let started_at = Utc::now();
        self.counter.reset();
        host.enter_transparent_mode()?;

        let fed = self.dispatch_and_feed(command, mode, host);
        let restored = host.restore_mode();
        let exit = match fed {
            Ok(exit) => exit,
            Err(e) => return Err(self.note_failure(e)),
        };
        restored?;

        let decision = if resume {
            PauseDecision::NoPause
        } else {
            pause::decide(&self.pause_context(host.capabilities()))
        };
        debug!(
            "Command finished ({:?}): {} output bytes, {:?}",
            exit,
            self.counter.value(),
            decision
        );
        if decision.should_pause() {
            host.wait_for_acknowledgment()?;
        }

        Ok(CommandReport {
            command: command.to_string(),
            mode,
            output_bytes: self.counter.value(),
            decision,
            completed: exit == FeedExit::Prompt,
            cwd: self.cwd.clone(),
            prompt: self.prompt.clone(),
            exit_code: None,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Hand the shell to the user until the toggle key is pressed
    pub fn resume<T: HostTerminal + ?Sized>(&mut self, host: &mut T) -> Result<CommandReport> {
        self.run_command("", InvocationMode::RunUserCommand, host)
    }

    fn dispatch_and_feed<T: HostTerminal + ?Sized>(
        &mut self,
        command: &str,
        mode: InvocationMode,
        host: &mut T,
    ) -> Result<FeedExit> {
        let dispatched = dispatcher::dispatch(
            &mut self.channel,
            &mut self.counter,
            command,
            mode,
            self.ready,
            self.terminator_echo,
        )?;

        let feed_mode = match dispatched {
            Dispatched::Command => {
                self.state = SubshellState::RunningCommand;
                self.ready = false;
                FeedMode::Command { mode }
            }
            Dispatched::Resume { .. } => FeedMode::Resume,
        };
        self.feed(feed_mode, host)
    }

    /// Ask the shell to exit, hanging it up if it does not within the grace
    /// period. Returns its exit code when known.
    pub fn shutdown(&mut self) -> Result<Option<i32>> {
        self.quitting = true;

        if self.channel.pty_mut().child_alive() {
            if self.state == SubshellState::Active && self.ready {
                if let Err(e) = self.channel.write_all(EXIT_COMMAND) {
                    debug!("Could not send exit to subshell: {}", e);
                }
            }

            if !self.wait_for_exit(self.settings.exit_grace) {
                info!("Subshell did not exit, sending SIGHUP");
                self.channel.pty_mut().signal(Signal::Hangup)?;
                // A shell parked by its prompt hook only sees the hangup once continued
                if let Err(e) = self.channel.pty_mut().signal(Signal::Continue) {
                    debug!("Could not continue subshell: {}", e);
                }
                self.wait_for_exit(self.settings.exit_grace);
            }
        }

        let exit_code = self.channel.pty().exit_code();
        self.state = SubshellState::Inactive;
        self.ready = false;
        self.process.mark_terminated(exit_code);
        info!("Subshell session {} closed: {}", self.id, self.process);
        debug!("Channel stats: {:?}", self.channel.stats());
        Ok(exit_code)
    }

    /// Poll for the child's exit, discarding output so it cannot block
    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut scratch = OutputByteCount::new();
        loop {
            if !self.channel.pty_mut().child_alive() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            match self.channel.pty_mut().poll(Some(EXIT_POLL_INTERVAL), false) {
                Ok(crate::pty::Readiness::Output) => {
                    if let Ok(ReadOutcome::EndOfFile) = self.channel.read_available(&mut scratch) {
                        thread::sleep(EXIT_POLL_INTERVAL);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Poll failed while waiting for exit: {}", e);
                    thread::sleep(EXIT_POLL_INTERVAL);
                }
            }
        }
    }

    /// Error for an end-of-file on the pty
    fn end_of_file(&mut self) -> Error {
        let deadline = Instant::now() + DEATH_CONFIRM_TIMEOUT;
        loop {
            if !self.channel.pty_mut().child_alive() {
                return Error::SubshellDied {
                    exit_code: self.channel.pty().exit_code(),
                };
            }
            if Instant::now() >= deadline {
                return Error::PtyReadFailed {
                    reason: "unexpected end of file from a live subshell".to_string(),
                };
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// Record a fatal error in the session state and hand it back
    fn note_failure(&mut self, error: Error) -> Error {
        if error.is_subshell_death() {
            warn!("{}", error);
            self.state = SubshellState::Inactive;
            self.ready = false;
            let exit_code = match &error {
                Error::SubshellDied { exit_code } => *exit_code,
                _ => None,
            };
            self.process.mark_terminated(exit_code);
        } else if error.is_session_fatal() {
            error!("Subshell session {} failed: {}", self.id, error);
        }
        error
    }

    fn ensure_started(&self) -> Result<()> {
        if self.state == SubshellState::Inactive {
            return Err(Error::SubshellNotRunning {
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn pause_context(&self, capabilities: TerminalCapabilities) -> PauseContext {
        PauseContext {
            policy: self.settings.pause_policy,
            quitting: self.quitting,
            state: self.state,
            capabilities,
            output: self.counter,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Byte accounting for the current or last command
    pub fn counter(&self) -> OutputByteCount {
        self.counter
    }

    pub fn state(&self) -> SubshellState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    /// Mark the application as shutting down; suppresses pauses
    pub fn set_quitting(&mut self, quitting: bool) {
        self.quitting = quitting;
    }

    /// Shell working directory as of its last prompt
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Prompt the shell printed last
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn process(&self) -> &SubshellProcess {
        &self.process
    }

    pub fn pause_policy(&self) -> PausePolicy {
        self.settings.pause_policy
    }

    pub fn set_pause_policy(&mut self, policy: PausePolicy) {
        self.settings.pause_policy = policy;
    }

    pub fn terminator_echo(&self) -> usize {
        self.terminator_echo
    }

    pub fn channel_stats(&self) -> &ChannelStats {
        self.channel.stats()
    }

    pub fn pty(&self) -> &P {
        self.channel.pty()
    }

    pub fn pty_mut(&mut self) -> &mut P {
        self.channel.pty_mut()
    }
}
