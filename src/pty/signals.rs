//! PTY Signal Handling
//!
//! Signals sent to the hosted shell and the stop/continue handshake used to
//! park it after each prompt report.

use nix::sys::signal::{kill, Signal as NixSignal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Polling interval while waiting for the shell to stop
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Signal types that can be sent to the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Interrupt signal (Ctrl+C)
    Interrupt,
    /// Termination signal (graceful shutdown)
    Terminate,
    /// Kill signal (forceful termination)
    Kill,
    /// Hangup signal
    Hangup,
    /// Continue signal
    Continue,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Hangup => "SIGHUP",
            Signal::Continue => "SIGCONT",
        }
    }

    fn to_nix(self) -> NixSignal {
        match self {
            Signal::Interrupt => NixSignal::SIGINT,
            Signal::Terminate => NixSignal::SIGTERM,
            Signal::Kill => NixSignal::SIGKILL,
            Signal::Hangup => NixSignal::SIGHUP,
            Signal::Continue => NixSignal::SIGCONT,
        }
    }
}

/// What `wait_for_stop` observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The shell is parked
    Stopped,
    /// The shell is gone
    Exited(Option<i32>),
}

/// Sends signals to one shell process and observes its stops
#[derive(Debug, Clone)]
pub struct SignalHandler {
    pid: u32,
}

impl SignalHandler {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn nix_pid(&self) -> Pid {
        Pid::from_raw(self.pid as i32)
    }

    /// Send a signal to the shell
    pub fn send(&self, signal: Signal) -> Result<()> {
        debug!("Sending {} to subshell {}", signal.name(), self.pid);
        kill(self.nix_pid(), signal.to_nix()).map_err(|e| Error::SignalSendFailed {
            signal: signal.name().to_string(),
            reason: e.to_string(),
        })
    }

    /// Check if the process exists
    pub fn is_process_running(&self) -> bool {
        kill(self.nix_pid(), None).is_ok()
    }

    /// Wait until the shell reports a stop, or it exits, or `timeout` passes
    pub fn wait_for_stop(&self, timeout: Duration) -> Result<StopOutcome> {
        let deadline = Instant::now() + timeout;
        let flags = WaitPidFlag::WUNTRACED | WaitPidFlag::WNOHANG;

        loop {
            match waitpid(self.nix_pid(), Some(flags)) {
                Ok(WaitStatus::Stopped(_, _)) => return Ok(StopOutcome::Stopped),
                Ok(WaitStatus::Exited(_, code)) => return Ok(StopOutcome::Exited(Some(code))),
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    debug!("Subshell killed by {:?}", signal);
                    return Ok(StopOutcome::Exited(None));
                }
                Ok(_) => {}
                Err(nix::errno::Errno::EINTR) => continue,
                Err(nix::errno::Errno::ECHILD) => return Ok(StopOutcome::Exited(None)),
                Err(e) => return Err(Error::Nix(e)),
            }

            if Instant::now() >= deadline {
                return Err(Error::PromptTimeout { timeout });
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
    }
}
