//! Terminal capability detection from `TERM` and the stdin device

use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::fs;
use std::path::Path;

use super::TerminalCapabilities;

/// Terminals that keep the shell's output reachable (alternate screen,
/// window title, mouse reporting)
static CAPABLE_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(xterm|rxvt|urxvt|Eterm|dtterm|konsole|screen|tmux|alacritty|kitty|foot|wezterm|gnome|vte)")
        .expect("static pattern")
});

/// Linux virtual console devices
static CONSOLE_DEVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/dev/(tty[0-9]+|vc/[0-9]+)$").expect("static pattern"));

pub fn is_capable_terminal_name(term: &str) -> bool {
    CAPABLE_TERM.is_match(term)
}

pub fn is_console_device(path: &Path) -> bool {
    path.to_str().is_some_and(|p| CONSOLE_DEVICE.is_match(p))
}

/// Capabilities for a given `TERM` value and stdin device
pub fn capabilities_for(term: Option<&str>, stdin_device: Option<&Path>) -> TerminalCapabilities {
    let capable_terminal = term.is_some_and(is_capable_terminal_name);
    let console_attached = term == Some("linux") && stdin_device.is_some_and(is_console_device);
    TerminalCapabilities::new(capable_terminal, console_attached)
}

/// Detect the capabilities of the terminal this process runs on
pub fn detect_capabilities() -> TerminalCapabilities {
    let term = env::var("TERM").ok();
    let stdin_device = fs::read_link("/proc/self/fd/0").ok();
    let caps = capabilities_for(term.as_deref(), stdin_device.as_deref());
    debug!(
        "Terminal capabilities: TERM={:?} capable={} console={}",
        term, caps.capable_terminal, caps.console_attached
    );
    caps
}
