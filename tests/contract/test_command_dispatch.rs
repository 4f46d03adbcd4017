//! Contract Tests for Command Dispatch
//!
//! Whatever the dispatcher writes and the shell echoes back must leave the
//! counter at zero once the echo has been read.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use subshell_host::error::Error;
use subshell_host::models::InvocationMode;
use subshell_host::pty::{ReadOutcome, Readiness, SubshellChannel, SubshellPty};
use subshell_host::subshell::dispatcher::{
    dispatch, COMMAND_TERMINATOR, DEFAULT_TERMINATOR_ECHO, QUIET_PREFIX, WAKE_SEQUENCE,
};
use subshell_host::subshell::{resolve_terminator_echo, Dispatched, OutputByteCount};
use test_utils::MockPty;

/// Read everything the mock has echoed so far
fn read_echo(channel: &mut SubshellChannel<MockPty>, counter: &mut OutputByteCount) -> Vec<u8> {
    let mut echoed = Vec::new();
    while channel
        .pty_mut()
        .poll(Some(std::time::Duration::ZERO), false)
        .unwrap()
        == Readiness::Output
    {
        match channel.read_available(counter).unwrap() {
            ReadOutcome::Data(data) => echoed.extend_from_slice(data),
            ReadOutcome::EndOfFile => break,
        }
    }
    echoed
}

#[test]
fn test_user_command_subtracts_text_and_terminator() {
    let mut channel = SubshellChannel::new(MockPty::new());
    let mut counter = OutputByteCount::new();

    let dispatched = dispatch(
        &mut channel,
        &mut counter,
        "echo hi",
        InvocationMode::RunUserCommand,
        true,
        2,
    )
    .unwrap();

    assert_eq!(dispatched, Dispatched::Command);
    assert!(dispatched.is_command());
    assert_eq!(channel.pty().written, b"echo hi\n");
    assert_eq!(counter.value(), -9);

    let echoed = read_echo(&mut channel, &mut counter);
    assert_eq!(echoed, b"echo hi\r\n");
    assert_eq!(counter.value(), 0);
}

#[test]
fn test_quiet_command_gets_history_prefix() {
    let mut channel = SubshellChannel::new(MockPty::new());
    let mut counter = OutputByteCount::new();

    dispatch(
        &mut channel,
        &mut counter,
        "cd /tmp",
        InvocationMode::Quietly,
        true,
        2,
    )
    .unwrap();

    let expected: Vec<u8> = [QUIET_PREFIX, b"cd /tmp", COMMAND_TERMINATOR].concat();
    assert_eq!(channel.pty().written, expected);
    assert_eq!(counter.value(), -(1 + 7 + 2));

    read_echo(&mut channel, &mut counter);
    assert_eq!(counter.value(), 0);
}

#[test]
fn test_terminator_echo_follows_line_discipline() {
    // Without ONLCR the terminator echoes as a bare "\n"
    let mut channel = SubshellChannel::new(MockPty::new().without_echo());
    let mut counter = OutputByteCount::new();

    dispatch(
        &mut channel,
        &mut counter,
        "true",
        InvocationMode::RunUserCommand,
        true,
        1,
    )
    .unwrap();
    assert_eq!(counter.value(), -5);
    assert_eq!(channel.pty().written, b"true\n");
}

#[test]
fn test_resume_on_ready_shell_writes_wake_once() {
    let mut channel = SubshellChannel::new(MockPty::new());
    let mut counter = OutputByteCount::new();

    let dispatched = dispatch(
        &mut channel,
        &mut counter,
        "",
        InvocationMode::RunUserCommand,
        true,
        2,
    )
    .unwrap();

    assert_eq!(dispatched, Dispatched::Resume { woke: true });
    assert!(!dispatched.is_command());
    assert_eq!(channel.pty().written, WAKE_SEQUENCE);
    assert_eq!(counter.value(), -(WAKE_SEQUENCE.len() as i64));

    let echoed = read_echo(&mut channel, &mut counter);
    assert_eq!(echoed, WAKE_SEQUENCE);
    assert_eq!(counter.value(), 0);
}

#[test]
fn test_resume_on_busy_shell_writes_nothing() {
    let mut channel = SubshellChannel::new(MockPty::new());
    let mut counter = OutputByteCount::new();

    let dispatched = dispatch(
        &mut channel,
        &mut counter,
        "   ",
        InvocationMode::RunUserCommand,
        false,
        2,
    )
    .unwrap();

    assert_eq!(dispatched, Dispatched::Resume { woke: false });
    assert!(channel.pty().written.is_empty());
    assert_eq!(counter.value(), 0);
}

#[test]
fn test_multiline_command_is_rejected_before_writing() {
    let mut channel = SubshellChannel::new(MockPty::new());
    let mut counter = OutputByteCount::new();

    let result = dispatch(
        &mut channel,
        &mut counter,
        "ls\nrm -rf ~",
        InvocationMode::RunUserCommand,
        true,
        2,
    );

    assert!(matches!(result, Err(Error::CommandValidationFailed { .. })));
    assert!(channel.pty().written.is_empty());
    assert_eq!(counter.value(), 0);
}

#[test]
fn test_terminator_echo_resolution() {
    assert_eq!(resolve_terminator_echo(None, None), DEFAULT_TERMINATOR_ECHO);
    assert_eq!(resolve_terminator_echo(None, Some(1)), 1);
    assert_eq!(resolve_terminator_echo(Some(2), Some(1)), 2);

    let pty = MockPty::new().with_terminator_echo(Some(1));
    assert_eq!(pty.terminator_echo_len(), Some(1));
}

#[test]
fn test_write_failure_is_fatal() {
    let mut pty = MockPty::new();
    pty.push_exit(1);
    let mut channel = SubshellChannel::new(pty);
    let mut counter = OutputByteCount::new();
    read_echo(&mut channel, &mut counter);

    let result = dispatch(
        &mut channel,
        &mut counter,
        "ls",
        InvocationMode::RunUserCommand,
        true,
        2,
    );
    match result {
        Err(e) => assert!(e.is_session_fatal()),
        Ok(other) => panic!("dispatch to a dead shell succeeded: {:?}", other),
    }
}
