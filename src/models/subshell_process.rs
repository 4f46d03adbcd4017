//! Subshell Process Model
//!
//! Lifecycle bookkeeping for the shell process behind the pty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ShellType;

/// Represents the state of the shell process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProcessState {
    /// Process has been created but not started
    #[default]
    Created,
    /// Process is running
    Running,
    /// Process stopped itself after reporting a prompt
    Stopped,
    /// Process has terminated
    Terminated,
}

/// The hosted shell process
#[derive(Debug, Clone)]
pub struct SubshellProcess {
    /// OS process identifier
    pub pid: Option<u32>,

    /// Current state of the process
    pub state: ProcessState,

    /// When the process was started
    pub start_time: Option<DateTime<Utc>>,

    /// When the process terminated (if applicable)
    pub end_time: Option<DateTime<Utc>>,

    /// Exit code (if process has terminated)
    pub exit_code: Option<i32>,

    /// Shell executable
    pub shell_path: PathBuf,

    /// Shell flavour, selects the prompt hook
    pub shell_type: ShellType,
}

impl SubshellProcess {
    /// Create a new process record in the Created state
    pub fn new(shell_path: PathBuf) -> Self {
        let shell_type = ShellType::from_path(&shell_path);
        Self {
            pid: None,
            state: ProcessState::Created,
            start_time: None,
            end_time: None,
            exit_code: None,
            shell_path,
            shell_type,
        }
    }

    /// Mark the process as started with the given PID
    pub fn mark_started(&mut self, pid: u32) {
        self.pid = Some(pid);
        self.state = ProcessState::Running;
        self.start_time = Some(Utc::now());
    }

    pub fn mark_stopped(&mut self) {
        if self.state == ProcessState::Running {
            self.state = ProcessState::Stopped;
        }
    }

    pub fn mark_continued(&mut self) {
        if self.state == ProcessState::Stopped {
            self.state = ProcessState::Running;
        }
    }

    /// Mark the process as terminated with the given exit code
    pub fn mark_terminated(&mut self, exit_code: Option<i32>) {
        self.state = ProcessState::Terminated;
        self.end_time = Some(Utc::now());
        self.exit_code = exit_code;
    }

    /// Check if the process is alive (running or stopped)
    pub fn is_alive(&self) -> bool {
        matches!(self.state, ProcessState::Running | ProcessState::Stopped)
    }

    /// Check if the process has terminated
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, ProcessState::Terminated)
    }

    /// How long the shell lived, once it has terminated
    pub fn lifetime(&self) -> Option<std::time::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                Some(end.signed_duration_since(start).to_std().unwrap_or_default())
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for SubshellProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pid_str = self.pid.map_or("N/A".to_string(), |pid| pid.to_string());
        write!(
            f,
            "{} [{}] - {:?}{}",
            self.shell_path.display(),
            pid_str,
            self.state,
            self.exit_code
                .map_or(String::new(), |code| format!(" (exit: {})", code))
        )
    }
}
