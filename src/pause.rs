//! Pause-after-run decisions
//!
//! Decides, once a command hands control back, whether the user gets a
//! chance to read its output before the screen is repainted. Each policy
//! branch is its own predicate; [`decide`] applies the gates shared by all
//! of them first.

use crate::models::{PausePolicy, SubshellState};
use crate::subshell::counter::OutputByteCount;
use crate::terminal::TerminalCapabilities;

/// Everything a pause decision depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseContext {
    pub policy: PausePolicy,
    /// The application is shutting down
    pub quitting: bool,
    /// Subshell state when control came back
    pub state: SubshellState,
    pub capabilities: TerminalCapabilities,
    /// Output accounted for the command
    pub output: OutputByteCount,
}

/// Outcome of a pause decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseDecision {
    /// Wait for a key press
    Pause,
    /// Repaint right away
    #[default]
    NoPause,
}

impl PauseDecision {
    pub fn should_pause(&self) -> bool {
        matches!(self, PauseDecision::Pause)
    }
}

/// `OnDumbTerminals`: the terminal cannot show the output again later
pub fn pause_on_dumb_terminal(capabilities: TerminalCapabilities) -> bool {
    capabilities.is_dumb()
}

/// `OnOutputOnly`: the command printed something of its own
pub fn pause_on_output(output: OutputByteCount) -> bool {
    output.has_output()
}

/// Apply the configured policy
pub fn decide(context: &PauseContext) -> PauseDecision {
    if context.quitting || context.state.is_running_command() {
        return PauseDecision::NoPause;
    }

    let pause = match context.policy {
        PausePolicy::Never => false,
        PausePolicy::Always => true,
        PausePolicy::OnDumbTerminals => pause_on_dumb_terminal(context.capabilities),
        PausePolicy::OnOutputOnly => pause_on_output(context.output),
    };

    trace!(
        "Pause decision: policy={} output={} pause={}",
        context.policy,
        context.output.value(),
        pause
    );

    if pause {
        PauseDecision::Pause
    } else {
        PauseDecision::NoPause
    }
}
