//! PTY Process Spawning
//!
//! Starts the interactive subshell, with its prompt hook, and one-shot
//! commands for the fallback path, using `portable-pty`.

use portable_pty::{native_pty_system, CommandBuilder, PtyPair, PtySize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::native::{NativePty, NotifyFifo};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ShellType, SubshellProcess};

/// Shell used for one-shot commands
const ONESHOT_SHELL: &str = "/bin/sh";

/// Process spawning configuration
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Shell executable
    pub shell_path: PathBuf,
    /// Terminal size
    pub size: PtySize,
    /// Extra environment variables
    pub env_vars: HashMap<String, String>,
    /// Working directory
    pub working_directory: Option<PathBuf>,
    /// How long to wait for the shell to park itself after a prompt
    pub stop_timeout: Duration,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            shell_path: PathBuf::from(get_user_shell()),
            size: PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            },
            env_vars: HashMap::new(),
            working_directory: None,
            stop_timeout: Duration::from_secs(2),
        }
    }
}

impl SpawnConfig {
    /// Spawn settings from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let (cols, rows) = config.pty.dimensions;
        Self {
            shell_path: config
                .subshell
                .shell_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(get_user_shell())),
            size: PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            },
            env_vars: config.pty.environment.clone(),
            working_directory: config.subshell.working_directory.clone(),
            stop_timeout: Duration::from_millis(config.subshell.stop_timeout_ms),
        }
    }
}

fn open_pair(command: &str, size: PtySize) -> Result<PtyPair> {
    native_pty_system()
        .openpty(size)
        .map_err(|e| Error::PtyCreationFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })
}

fn apply_environment(cmd: &mut CommandBuilder, config: &SpawnConfig) {
    for (key, value) in &config.env_vars {
        cmd.env(key, value);
    }
    if let Some(dir) = &config.working_directory {
        cmd.cwd(dir);
    }
}

/// Spawn the interactive subshell with its prompt hook installed
pub fn spawn_subshell(config: &SpawnConfig) -> Result<(NativePty, SubshellProcess)> {
    let shell = config.shell_path.to_string_lossy().to_string();
    let mut process = SubshellProcess::new(config.shell_path.clone());

    if !process.shell_type.supports_subshell() {
        return Err(Error::CommandSpawnFailed {
            command: shell,
            reason: "no prompt hook available for this shell".to_string(),
        });
    }

    // Private directory for the FIFO and init files, removed with the pty
    let session_dir = tempfile::Builder::new()
        .prefix("subshell-host.")
        .tempdir()?;
    let notify = NotifyFifo::create(session_dir.path())?;
    let launch = process
        .shell_type
        .launch(session_dir.path(), notify.path())
        .ok_or_else(|| Error::CommandSpawnFailed {
            command: shell.clone(),
            reason: "no prompt hook available for this shell".to_string(),
        })?;
    if let Some((path, contents)) = &launch.init_file {
        fs::write(path, contents)?;
    }

    let pair = open_pair(&shell, config.size)?;
    let mut cmd = CommandBuilder::new(&config.shell_path);
    cmd.args(&launch.args);
    for (key, value) in &launch.env {
        cmd.env(key, value);
    }
    apply_environment(&mut cmd, config);

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| Error::CommandSpawnFailed {
            command: shell.clone(),
            reason: e.to_string(),
        })?;
    // The master only sees EOF once every slave handle is closed
    drop(pair.slave);

    process.mark_started(child.process_id().unwrap_or(0));
    info!(
        "Started {} subshell {} (pid {:?})",
        process.shell_type.as_str(),
        shell,
        process.pid
    );

    let pty = NativePty::new(
        pair.master,
        child,
        Some(notify),
        Some(session_dir),
        config.stop_timeout,
    )?;
    Ok((pty, process))
}

/// Spawn `sh -c <command>` on a fresh pty, without a prompt hook
pub fn spawn_oneshot(command: &str, config: &SpawnConfig) -> Result<(NativePty, SubshellProcess)> {
    let pair = open_pair(command, config.size)?;
    let mut cmd = CommandBuilder::new(ONESHOT_SHELL);
    cmd.arg("-c");
    cmd.arg(command);
    apply_environment(&mut cmd, config);

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| Error::CommandSpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
    drop(pair.slave);

    let mut process = SubshellProcess::new(PathBuf::from(ONESHOT_SHELL));
    process.mark_started(child.process_id().unwrap_or(0));
    debug!("Started one-shot '{}' (pid {:?})", command, process.pid);

    let pty = NativePty::new(pair.master, child, None, None, config.stop_timeout)?;
    Ok((pty, process))
}

/// Get the default shell for the current platform
pub fn get_default_shell() -> String {
    ["/bin/bash", "/usr/bin/bash", "/bin/zsh", "/usr/bin/zsh"]
        .iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(|candidate| candidate.to_string())
        .unwrap_or_else(|| ONESHOT_SHELL.to_string())
}

/// Get the current user's shell, if it is one we can host
pub fn get_user_shell() -> String {
    match std::env::var("SHELL") {
        Ok(shell) if ShellType::from_path(Path::new(&shell)).supports_subshell() => shell,
        _ => get_default_shell(),
    }
}
