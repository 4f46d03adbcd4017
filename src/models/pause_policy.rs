//! Pause Policy
//!
//! When to hold the subshell's output on screen after a command finishes.
//! The index order is the order the settings dialog presents the choices in
//! and is part of the persisted format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// When to wait for a keypress before the file manager repaints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PausePolicy {
    /// Never pause
    Never,
    /// Pause only on terminals that cannot keep the output visible
    #[default]
    OnDumbTerminals,
    /// Always pause
    Always,
    /// Pause only when the command wrote something
    OnOutputOnly,
}

impl PausePolicy {
    /// All policies in dialog index order
    pub const ALL: [PausePolicy; 4] = [
        PausePolicy::Never,
        PausePolicy::OnDumbTerminals,
        PausePolicy::Always,
        PausePolicy::OnOutputOnly,
    ];

    /// Persisted name
    pub fn as_str(&self) -> &'static str {
        match self {
            PausePolicy::Never => "never",
            PausePolicy::OnDumbTerminals => "on_dumb_terminals",
            PausePolicy::Always => "always",
            PausePolicy::OnOutputOnly => "on_output_only",
        }
    }

    /// Dialog label, `&` marks the hotkey
    pub fn label(&self) -> &'static str {
        match self {
            PausePolicy::Never => "&Never",
            PausePolicy::OnDumbTerminals => "On dum&b terminals",
            PausePolicy::Always => "Alwa&ys",
            PausePolicy::OnOutputOnly => "On output only",
        }
    }

    /// Position in the settings dialog
    pub fn index(&self) -> usize {
        match self {
            PausePolicy::Never => 0,
            PausePolicy::OnDumbTerminals => 1,
            PausePolicy::Always => 2,
            PausePolicy::OnOutputOnly => 3,
        }
    }

    /// Policy at a settings dialog position
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Labels in index order, for the settings dialog
    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|p| p.label()).collect()
    }
}

impl fmt::Display for PausePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PausePolicy {
    type Err = Error;

    /// Accepts the persisted name, a dashed variant of it, or the ordinal
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        if let Ok(index) = normalized.parse::<usize>() {
            return Self::from_index(index).ok_or_else(|| Error::UnknownPausePolicy {
                value: s.to_string(),
            });
        }

        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| Error::UnknownPausePolicy {
                value: s.to_string(),
            })
    }
}
