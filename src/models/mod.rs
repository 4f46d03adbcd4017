//! Core data models for the subshell host
//!
//! Pause policy, subshell state, shell flavours and the shell process record.

pub mod pause_policy;
pub mod shell_type;
pub mod subshell_process;
pub mod subshell_state;

// Re-exports for convenience
pub use pause_policy::PausePolicy;
pub use shell_type::{ShellLaunch, ShellType};
pub use subshell_process::{ProcessState, SubshellProcess};
pub use subshell_state::{InvocationMode, SubshellState};
