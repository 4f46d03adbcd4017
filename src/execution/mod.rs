//! One-shot command execution
//!
//! Used when the persistent subshell is disabled or has died. Each command
//! gets its own pty running `sh -c`; there is no echo and no prompt, so every
//! byte read counts as output and the command is finished at end-of-file.
//! The same pause policy applies afterwards.

use chrono::Utc;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{InvocationMode, PausePolicy, SubshellState};
use crate::pause::{self, PauseContext};
use crate::pty::{spawn_oneshot, ReadOutcome, Readiness, SpawnConfig, SubshellChannel, SubshellPty};
use crate::subshell::dispatcher::{is_resume, validate_command};
use crate::subshell::{CommandReport, OutputByteCount};
use crate::terminal::HostTerminal;

/// How long to wait for an exit status after end-of-file
const EXIT_STATUS_TIMEOUT: Duration = Duration::from_secs(1);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs commands on throwaway ptys
#[derive(Debug, Clone)]
pub struct FallbackExecutor {
    spawn: SpawnConfig,
    policy: PausePolicy,
    buffer_size: usize,
    quitting: bool,
}

impl FallbackExecutor {
    pub fn new(spawn: SpawnConfig, policy: PausePolicy, buffer_size: usize) -> Self {
        Self {
            spawn,
            policy,
            buffer_size,
            quitting: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SpawnConfig::from_config(config),
            config.pause.after_run,
            config.pty.buffer_size,
        )
    }

    pub fn set_quitting(&mut self, quitting: bool) {
        self.quitting = quitting;
    }

    pub fn set_policy(&mut self, policy: PausePolicy) {
        self.policy = policy;
    }

    /// Run `command` to completion and apply the pause policy
    pub fn execute<T: HostTerminal + ?Sized>(
        &self,
        command: &str,
        host: &mut T,
    ) -> Result<CommandReport> {
        validate_command(command)?;
        if is_resume(command) {
            return Err(Error::CommandValidationFailed {
                command: command.to_string(),
                reason: "there is no shell to resume".to_string(),
            });
        }

        let (pty, process) = spawn_oneshot(command, &self.spawn)?;
        debug!("Fallback execution of '{}' as {}", command, process);
        run_oneshot(pty, command, self.policy, self.buffer_size, self.quitting, host)
    }
}

/// Feed a one-shot pty until end-of-file, then decide on a pause
pub fn run_oneshot<P: SubshellPty, T: HostTerminal + ?Sized>(
    pty: P,
    command: &str,
    policy: PausePolicy,
    buffer_size: usize,
    quitting: bool,
    host: &mut T,
) -> Result<CommandReport> {
    let started_at = Utc::now();
    let mut channel = SubshellChannel::with_buffer_size(pty, buffer_size);
    let mut counter = OutputByteCount::new();

    host.enter_transparent_mode()?;
    let fed = feed_until_eof(&mut channel, &mut counter, host);
    let restored = host.restore_mode();
    fed?;
    restored?;

    let exit_code = wait_for_exit_status(channel.pty_mut());
    let decision = pause::decide(&PauseContext {
        policy,
        quitting,
        state: SubshellState::Active,
        capabilities: host.capabilities(),
        output: counter,
    });
    debug!(
        "One-shot '{}' exited with {:?}, {} output bytes",
        command,
        exit_code,
        counter.value()
    );
    if decision.should_pause() {
        host.wait_for_acknowledgment()?;
    }

    Ok(CommandReport {
        command: command.to_string(),
        mode: InvocationMode::RunUserCommand,
        output_bytes: counter.value(),
        decision,
        completed: true,
        cwd: None,
        prompt: String::new(),
        exit_code,
        started_at,
        finished_at: Utc::now(),
    })
}

fn feed_until_eof<P: SubshellPty, T: HostTerminal + ?Sized>(
    channel: &mut SubshellChannel<P>,
    counter: &mut OutputByteCount,
    host: &mut T,
) -> Result<()> {
    let mut watch_keys = true;
    let mut keys = [0u8; 256];

    loop {
        match channel.pty_mut().poll(None, watch_keys)? {
            Readiness::Output => match channel.read_available(counter)? {
                ReadOutcome::Data(data) => host.write_output(data)?,
                ReadOutcome::EndOfFile => return Ok(()),
            },
            Readiness::HostInput => match channel.pty_mut().read_host_input(&mut keys) {
                Ok(0) => watch_keys = false,
                Ok(n) => {
                    channel.write_all(&keys[..n])?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            },
            Readiness::Notification | Readiness::TimedOut => {}
        }
    }
}

fn wait_for_exit_status<P: SubshellPty>(pty: &mut P) -> Option<i32> {
    let deadline = Instant::now() + EXIT_STATUS_TIMEOUT;
    while pty.child_alive() {
        if Instant::now() >= deadline {
            warn!("One-shot command still running after end of output");
            return None;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
    pty.exit_code()
}
