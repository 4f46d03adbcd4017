//! Shell Type Definitions
//!
//! Shells the subshell can be hosted in, and how each one is started so that
//! it reports every prompt through the notification FIFO.
//!
//! The prompt hook writes the working directory to the FIFO and then stops
//! the shell with `SIGSTOP`. The host continues it once it has finished
//! accounting for the command's output, so the prompt the shell prints next
//! never mixes with that output.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Type of shell being hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShellType {
    /// Bourne Again Shell
    #[default]
    Bash,
    /// Z Shell
    Zsh,
    /// Fish Shell
    Fish,
    /// Other/Unknown shell
    Other,
}

/// How to launch a shell with the prompt hook installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellLaunch {
    /// Arguments after the shell path
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Init file to write before spawning: path and contents
    pub init_file: Option<(PathBuf, String)>,
}

impl ShellType {
    /// Get a string representation of the shell type
    pub fn as_str(&self) -> &'static str {
        match self {
            ShellType::Bash => "bash",
            ShellType::Zsh => "zsh",
            ShellType::Fish => "fish",
            ShellType::Other => "other",
        }
    }

    /// Get shell type from string (case-insensitive)
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bash" => ShellType::Bash,
            "zsh" => ShellType::Zsh,
            "fish" => ShellType::Fish,
            _ => ShellType::Other,
        }
    }

    /// Detect the shell type from an executable path such as `/usr/bin/zsh`
    pub fn from_path(path: &Path) -> Self {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.trim_start_matches('-'))
            .map(Self::from_string)
            .unwrap_or(ShellType::Other)
    }

    /// Whether the shell has a prompt hook we can install
    pub fn supports_subshell(&self) -> bool {
        matches!(self, ShellType::Bash | ShellType::Zsh | ShellType::Fish)
    }

    /// Build the launch recipe for this shell.
    ///
    /// `init_dir` is a private directory the init file may be written to and
    /// `notify_path` is the FIFO the prompt hook reports to.
    pub fn launch(&self, init_dir: &Path, notify_path: &Path) -> Option<ShellLaunch> {
        let fifo = shell_quote(&notify_path.to_string_lossy());

        match self {
            ShellType::Bash => {
                let rc_path = init_dir.join("bashrc");
                let script = format!(
                    concat!(
                        "if [ -f \"$HOME/.bashrc\" ]; then . \"$HOME/.bashrc\"; fi\n",
                        "HISTCONTROL=ignorespace\n",
                        // Paste-mode toggles around each line would count as output
                        "bind 'set enable-bracketed-paste off' 2>/dev/null\n",
                        "PROMPT_COMMAND=\"${{PROMPT_COMMAND:+$PROMPT_COMMAND;}}",
                        "pwd >{fifo}; kill -STOP \\$\\$\"\n",
                    ),
                    fifo = fifo
                );
                Some(ShellLaunch {
                    args: vec![
                        "--rcfile".to_string(),
                        rc_path.to_string_lossy().to_string(),
                        "-i".to_string(),
                    ],
                    env: Vec::new(),
                    init_file: Some((rc_path, script)),
                })
            }
            ShellType::Zsh => {
                let rc_path = init_dir.join(".zshrc");
                let script = format!(
                    concat!(
                        "if [ -f \"$HOME/.zshrc\" ]; then ZDOTDIR=\"$HOME\" . \"$HOME/.zshrc\"; fi\n",
                        "setopt HIST_IGNORE_SPACE\n",
                        "unset zle_bracketed_paste\n",
                        "__subshell_host_notify() {{ pwd >| {fifo}; kill -STOP $$ }}\n",
                        "precmd_functions+=(__subshell_host_notify)\n",
                    ),
                    fifo = fifo
                );
                Some(ShellLaunch {
                    args: vec!["-i".to_string()],
                    env: vec![(
                        "ZDOTDIR".to_string(),
                        init_dir.to_string_lossy().to_string(),
                    )],
                    init_file: Some((rc_path, script)),
                })
            }
            ShellType::Fish => {
                // Fish keeps commands with a leading space out of history on its own
                let init = format!(
                    "function __subshell_host_notify --on-event fish_prompt; pwd > {fifo}; kill -STOP $fish_pid; end",
                    fifo = fifo
                );
                Some(ShellLaunch {
                    args: vec!["--init-command".to_string(), init, "-i".to_string()],
                    env: Vec::new(),
                    init_file: None,
                })
            }
            ShellType::Other => None,
        }
    }
}

/// Single-quote a string for any POSIX-like shell (and fish)
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
