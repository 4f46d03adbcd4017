//! Mock PTY Implementation for Testing
//!
//! A [`MockPty`] plays back a script of shell events. Bytes written to it
//! are echoed the way a cooked-mode line discipline would, with `\n` turned
//! into `\r\n`, so byte accounting sees the same echo a real shell produces.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use subshell_host::error::{Error, Result};
use subshell_host::pty::{Readiness, Signal, SubshellPty};

/// One scripted step of the shell's behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Bytes the shell prints
    Output(Vec<u8>),
    /// The prompt hook reports `cwd`; `in_flight` is output that only
    /// becomes readable once the shell has stopped itself
    Prompt { cwd: String, in_flight: Vec<u8> },
    /// Keystrokes typed on the host terminal
    Keys(Vec<u8>),
    /// The shell exits
    Exit(i32),
}

/// Scripted pty for session tests
pub struct MockPty {
    events: VecDeque<MockEvent>,
    /// Readable right now: echo, prompt text, in-flight output
    pending: VecDeque<u8>,
    in_flight: Vec<u8>,
    pub prompt: Vec<u8>,
    pub echo: bool,
    /// Whether writing `exit\n` terminates the shell
    pub exits_on_exit_command: bool,
    pub terminator_echo: Option<usize>,
    pub written: Vec<u8>,
    pub signals: Vec<Signal>,
    pub stops: usize,
    pub continues: usize,
    alive: bool,
    exit_code: Option<i32>,
}

impl Default for MockPty {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPty {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            pending: VecDeque::new(),
            in_flight: Vec::new(),
            prompt: b"user@host:~$ ".to_vec(),
            echo: true,
            exits_on_exit_command: true,
            terminator_echo: Some(2),
            written: Vec::new(),
            signals: Vec::new(),
            stops: 0,
            continues: 0,
            alive: true,
            exit_code: None,
        }
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.as_bytes().to_vec();
        self
    }

    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn with_terminator_echo(mut self, bytes: Option<usize>) -> Self {
        self.terminator_echo = bytes;
        self
    }

    pub fn push_output(&mut self, bytes: &[u8]) -> &mut Self {
        self.events.push_back(MockEvent::Output(bytes.to_vec()));
        self
    }

    pub fn push_prompt(&mut self, cwd: &str) -> &mut Self {
        self.push_prompt_with_in_flight(cwd, b"")
    }

    pub fn push_prompt_with_in_flight(&mut self, cwd: &str, in_flight: &[u8]) -> &mut Self {
        self.events.push_back(MockEvent::Prompt {
            cwd: cwd.to_string(),
            in_flight: in_flight.to_vec(),
        });
        self
    }

    pub fn push_keys(&mut self, keys: &[u8]) -> &mut Self {
        self.events.push_back(MockEvent::Keys(keys.to_vec()));
        self
    }

    pub fn push_exit(&mut self, code: i32) -> &mut Self {
        self.events.push_back(MockEvent::Exit(code));
        self
    }

    /// Everything written so far, lossily decoded
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    pub fn is_script_done(&self) -> bool {
        self.events.is_empty() && self.pending.is_empty()
    }

    fn die(&mut self, exit_code: Option<i32>) {
        self.alive = false;
        self.exit_code = exit_code;
    }

    fn take_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        n
    }
}

impl SubshellPty for MockPty {
    fn poll(&mut self, timeout: Option<Duration>, watch_host_input: bool) -> Result<Readiness> {
        if !self.pending.is_empty() {
            return Ok(Readiness::Output);
        }
        match self.events.front() {
            Some(MockEvent::Output(_)) | Some(MockEvent::Exit(_)) => Ok(Readiness::Output),
            Some(MockEvent::Prompt { .. }) => Ok(Readiness::Notification),
            Some(MockEvent::Keys(_)) if watch_host_input => Ok(Readiness::HostInput),
            _ if !self.alive => Ok(Readiness::Output),
            _ => match timeout {
                Some(_) => Ok(Readiness::TimedOut),
                // Nothing left to play back; fail instead of blocking forever
                None => Err(Error::PtyPollFailed {
                    reason: "mock script exhausted".to_string(),
                }),
            },
        }
    }

    fn read_output(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.pending.is_empty() {
            return Ok(self.take_pending(buf));
        }
        match self.events.front() {
            Some(MockEvent::Output(_)) => {
                if let Some(MockEvent::Output(bytes)) = self.events.pop_front() {
                    self.pending.extend(bytes);
                }
                Ok(self.take_pending(buf))
            }
            Some(MockEvent::Exit(code)) => {
                let code = *code;
                self.events.pop_front();
                self.die(Some(code));
                Ok(0)
            }
            _ if !self.alive => Ok(0),
            _ => Err(io::Error::new(io::ErrorKind::Other, "no output scripted")),
        }
    }

    fn write_input(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.alive {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.written.extend_from_slice(buf);
        if self.echo {
            for &byte in buf {
                if byte == b'\n' {
                    self.pending.extend(b"\r\n");
                } else {
                    self.pending.push_back(byte);
                }
            }
        }
        if self.exits_on_exit_command && buf.ends_with(b"\n") {
            let body = &self.written[..self.written.len() - 1];
            let line = body.rsplit(|b| *b == b'\n').next().unwrap_or_default();
            if String::from_utf8_lossy(line).trim() == "exit" {
                self.die(Some(0));
            }
        }
        Ok(buf.len())
    }

    fn flush_input(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_notification(&mut self) -> Result<Option<String>> {
        match self.events.front() {
            Some(MockEvent::Prompt { .. }) => match self.events.pop_front() {
                Some(MockEvent::Prompt { cwd, in_flight }) => {
                    self.in_flight = in_flight;
                    Ok(Some(cwd))
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn read_host_input(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.events.front() {
            Some(MockEvent::Keys(_)) => match self.events.pop_front() {
                Some(MockEvent::Keys(keys)) => {
                    let n = keys.len().min(buf.len());
                    buf[..n].copy_from_slice(&keys[..n]);
                    Ok(n)
                }
                _ => Ok(0),
            },
            _ => Ok(0),
        }
    }

    fn child_alive(&mut self) -> bool {
        self.alive
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn wait_for_stop(&mut self) -> Result<()> {
        if !self.alive {
            return Err(Error::SubshellDied {
                exit_code: self.exit_code,
            });
        }
        self.stops += 1;
        let in_flight = std::mem::take(&mut self.in_flight);
        self.pending.extend(in_flight);
        Ok(())
    }

    fn continue_shell(&mut self) -> Result<()> {
        self.continues += 1;
        let prompt = self.prompt.clone();
        self.pending.extend(prompt);
        Ok(())
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        self.signals.push(signal);
        if signal == Signal::Hangup {
            self.die(None);
        }
        Ok(())
    }

    fn terminator_echo_len(&self) -> Option<usize> {
        self.terminator_echo
    }
}
