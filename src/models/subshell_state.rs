//! Subshell state and invocation modes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the hosted shell is in its command cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SubshellState {
    /// Not started, or torn down
    #[default]
    Inactive,
    /// Idle at its prompt
    Active,
    /// Executing a dispatched command
    RunningCommand,
}

impl SubshellState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubshellState::Inactive => "inactive",
            SubshellState::Active => "active",
            SubshellState::RunningCommand => "running_command",
        }
    }

    /// Whether the shell is still executing a command
    pub fn is_running_command(&self) -> bool {
        matches!(self, SubshellState::RunningCommand)
    }
}

impl fmt::Display for SubshellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a command is handed to the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InvocationMode {
    /// Issued by the application itself: kept out of the shell history and
    /// its output is not shown
    Quietly,
    /// Typed by the user: echoed and shown
    #[default]
    RunUserCommand,
}

impl InvocationMode {
    /// Whether subshell output is forwarded to the host screen
    pub fn shows_output(&self) -> bool {
        matches!(self, InvocationMode::RunUserCommand)
    }
}
