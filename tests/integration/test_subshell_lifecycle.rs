//! Integration Tests for the Subshell Session Lifecycle
//!
//! Start-up, interactive resume, death of the shell, shutdown and the
//! one-shot fallback, all against scripted collaborators.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::path::{Path, PathBuf};

use subshell_host::error::Error;
use subshell_host::execution::run_oneshot;
use subshell_host::models::{InvocationMode, PausePolicy, ProcessState, SubshellProcess, SubshellState};
use subshell_host::pty::Signal;
use subshell_host::subshell::dispatcher::WAKE_SEQUENCE;
use subshell_host::subshell::SubshellSession;
use subshell_host::{Config, FallbackExecutor};
use test_utils::{capable_terminal, started_session, test_settings, MockPty, MockTerminal};

fn unstarted_session(pty: MockPty) -> SubshellSession<MockPty> {
    let mut process = SubshellProcess::new(PathBuf::from("/bin/bash"));
    process.mark_started(4242);
    SubshellSession::new(pty, process, test_settings(PausePolicy::OnOutputOnly))
}

#[test]
fn test_start_waits_for_first_prompt() {
    let session = started_session(MockPty::new(), PausePolicy::OnOutputOnly);

    assert_eq!(session.state(), SubshellState::Active);
    assert!(session.is_ready());
    assert_eq!(session.cwd(), Some(Path::new("/home/user")));
    assert_eq!(session.prompt(), "user@host:~$ ");
    assert_eq!(session.pty().stops, 1);
    assert_eq!(session.pty().continues, 1);
    assert_eq!(session.process().state, ProcessState::Running);
}

#[test]
fn test_run_before_start_is_rejected() {
    let mut session = unstarted_session(MockPty::new());
    let mut host = MockTerminal::new(capable_terminal());

    let result = session.run_command("ls", InvocationMode::RunUserCommand, &mut host);
    assert!(matches!(result, Err(Error::SubshellNotRunning { .. })));
    assert!(session.pty().written.is_empty());
    assert_eq!(host.transparent_entries, 0);
}

#[test]
fn test_start_times_out_without_prompt() {
    let mut session = unstarted_session(MockPty::new());

    let result = session.start();
    assert!(matches!(result, Err(Error::PromptTimeout { .. })));
    assert_eq!(session.state(), SubshellState::Inactive);
}

#[test]
fn test_shell_death_is_fatal() {
    let mut session = started_session(MockPty::new(), PausePolicy::OnOutputOnly);
    session.pty_mut().push_output(b"segfault\r\n").push_exit(139);
    let mut host = MockTerminal::new(capable_terminal());

    let result = session.run_command("./crash", InvocationMode::RunUserCommand, &mut host);

    match result {
        Err(e @ Error::SubshellDied { .. }) => {
            assert!(e.is_session_fatal());
            assert!(matches!(e, Error::SubshellDied { exit_code: Some(139) }));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(session.state(), SubshellState::Inactive);
    assert!(session.process().is_terminated());
    assert!(!host.transparent);
    assert_eq!(host.restores, 1);
    assert_eq!(host.acknowledgments, 0);

    let again = session.run_command("ls", InvocationMode::RunUserCommand, &mut host);
    assert!(matches!(again, Err(Error::SubshellNotRunning { .. })));
}

#[test]
fn test_exit_command_kills_the_shell() {
    let mut session = started_session(MockPty::new(), PausePolicy::OnOutputOnly);
    let mut host = MockTerminal::new(capable_terminal());

    let result = session.run_command("exit", InvocationMode::RunUserCommand, &mut host);
    assert!(matches!(result, Err(Error::SubshellDied { exit_code: Some(0) })));
}

#[test]
fn test_shutdown_sends_exit() {
    let mut session = started_session(MockPty::new(), PausePolicy::OnOutputOnly);

    let exit_code = session.shutdown().unwrap();

    assert_eq!(exit_code, Some(0));
    assert_eq!(session.pty().written, b" exit\n");
    assert!(session.pty().signals.is_empty());
    assert!(session.is_quitting());
    assert_eq!(session.state(), SubshellState::Inactive);
    assert!(session.process().is_terminated());
}

#[test]
fn test_shutdown_hangs_up_a_stubborn_shell() {
    let mut pty = MockPty::new();
    pty.exits_on_exit_command = false;
    let mut session = started_session(pty, PausePolicy::OnOutputOnly);

    let exit_code = session.shutdown().unwrap();

    assert_eq!(exit_code, None);
    assert_eq!(session.pty().signals, vec![Signal::Hangup, Signal::Continue]);
    assert_eq!(session.state(), SubshellState::Inactive);
}

#[test]
fn test_resume_forwards_keys_until_toggle() {
    let mut session = started_session(MockPty::new(), PausePolicy::Always);
    session.pty_mut().push_keys(b"ab").push_keys(&[b'c', 0x0f, b'z']);
    let mut host = MockTerminal::new(capable_terminal());

    let report = session.resume(&mut host).unwrap();

    assert!(!report.completed);
    assert!(!report.paused());
    assert_eq!(session.pty().written, [WAKE_SEQUENCE, &b"abc"[..]].concat());
    // Keys typed after the toggle key are dropped
    assert!(host.output.starts_with(&[WAKE_SEQUENCE, &b"ab"[..]].concat()));
    assert_eq!(host.transparent_entries, 1);
    assert_eq!(host.restores, 1);
    assert_eq!(session.state(), SubshellState::Active);
}

#[test]
fn test_resume_survives_interactive_commands() {
    let mut session = started_session(MockPty::new(), PausePolicy::OnOutputOnly);
    session
        .pty_mut()
        .push_keys(b"ls\n")
        .push_output(b"file\r\n")
        .push_prompt("/home/user/src")
        .push_keys(&[0x0f]);
    let mut host = MockTerminal::new(capable_terminal());

    let report = session.resume(&mut host).unwrap();

    assert!(!report.completed);
    assert_eq!(session.cwd(), Some(Path::new("/home/user/src")));
    assert_eq!(session.pty().stops, 2);
    // The user sees the fresh prompt
    assert!(host.output_text().ends_with("file\r\nuser@host:~$ "));
}

#[test]
fn test_toggle_during_command_then_resume_to_finish() {
    let mut session = started_session(MockPty::new(), PausePolicy::OnOutputOnly);
    session.pty_mut().push_output(b"working\r\n").push_keys(&[0x0f]);
    let mut host = MockTerminal::new(capable_terminal());

    let report = session
        .run_command("make", InvocationMode::RunUserCommand, &mut host)
        .unwrap();
    assert!(!report.completed);
    assert!(!report.paused());
    assert_eq!(session.state(), SubshellState::RunningCommand);

    let busy = session.run_command("ls", InvocationMode::RunUserCommand, &mut host);
    match busy {
        Err(e @ Error::CommandValidationFailed { .. }) => assert!(!e.is_session_fatal()),
        other => panic!("unexpected result: {:?}", other),
    }

    session.pty_mut().clear_written();
    session.pty_mut().push_output(b"done\r\n").push_prompt("/home/user");
    let report = session.resume(&mut host).unwrap();

    // No wake on a busy shell
    assert!(session.pty().written.is_empty());
    assert!(report.completed);
    assert!(!report.paused());
    assert_eq!(session.state(), SubshellState::Active);
    assert!(session.is_ready());
}

#[test]
fn test_multiline_command_is_not_fatal() {
    let mut session = started_session(MockPty::new(), PausePolicy::OnOutputOnly);
    let mut host = MockTerminal::new(capable_terminal());

    let result = session.run_command("ls\nrm x", InvocationMode::RunUserCommand, &mut host);
    match result {
        Err(e) => assert!(!e.is_session_fatal()),
        Ok(report) => panic!("multi-line command ran: {:?}", report),
    }
    assert!(session.pty().written.is_empty());
    assert_eq!(session.state(), SubshellState::Active);
}

#[test]
fn test_terminal_mode_failure_leaves_shell_idle() {
    let mut session = started_session(MockPty::new(), PausePolicy::OnOutputOnly);
    let mut host = MockTerminal::new(capable_terminal());
    host.fail_transparent = true;

    let result = session.run_command("ls", InvocationMode::RunUserCommand, &mut host);
    assert!(matches!(result, Err(Error::TerminalModeFailed { .. })));
    assert!(session.pty().written.is_empty());
    assert_eq!(session.state(), SubshellState::Active);
}

#[test]
fn test_pause_policy_can_change_between_commands() {
    let mut session = started_session(MockPty::new(), PausePolicy::Never);
    assert_eq!(session.pause_policy(), PausePolicy::Never);
    session.set_pause_policy(PausePolicy::Always);

    session.pty_mut().push_prompt("/home/user");
    let mut host = MockTerminal::new(capable_terminal());
    let report = session
        .run_command("true", InvocationMode::RunUserCommand, &mut host)
        .unwrap();
    assert!(report.paused());
}

#[test]
fn test_oneshot_counts_everything() {
    let mut pty = MockPty::new().without_echo();
    pty.push_output(b"hello\r\n").push_exit(0);
    let mut host = MockTerminal::new(capable_terminal());

    let report = run_oneshot(pty, "echo hello", PausePolicy::OnOutputOnly, 4096, false, &mut host)
        .unwrap();

    assert_eq!(report.output_bytes, 7);
    assert!(report.paused());
    assert!(report.completed);
    assert_eq!(report.exit_code, Some(0));
    assert_eq!(host.output_text(), "hello\r\n");
    assert_eq!(host.acknowledgments, 1);
}

#[test]
fn test_oneshot_without_output() {
    let mut pty = MockPty::new().without_echo();
    pty.push_exit(1);
    let mut host = MockTerminal::new(capable_terminal());

    let report =
        run_oneshot(pty, "false", PausePolicy::OnOutputOnly, 4096, false, &mut host).unwrap();

    assert_eq!(report.output_bytes, 0);
    assert!(!report.paused());
    assert_eq!(report.exit_code, Some(1));
}

#[test]
fn test_oneshot_quitting_never_pauses() {
    let mut pty = MockPty::new().without_echo();
    pty.push_output(b"x").push_exit(0);
    let mut host = MockTerminal::new(capable_terminal());

    let report = run_oneshot(pty, "echo -n x", PausePolicy::Always, 4096, true, &mut host).unwrap();
    assert!(!report.paused());
}

#[test]
fn test_fallback_rejects_resume() {
    let executor = FallbackExecutor::from_config(&Config::default());
    let mut host = MockTerminal::new(capable_terminal());

    let result = executor.execute("  ", &mut host);
    assert!(matches!(result, Err(Error::CommandValidationFailed { .. })));
    assert_eq!(host.transparent_entries, 0);
}
