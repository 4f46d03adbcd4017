//! Native PTY
//!
//! [`SubshellPty`] over a real pseudoterminal from `portable-pty`, with the
//! prompt notification FIFO and the host's stdin multiplexed by `poll(2)`.

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::stat::Mode;
use nix::sys::termios::{tcgetattr, OutputFlags};
use nix::unistd::mkfifo;
use portable_pty::{Child, MasterPty};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use super::signals::{Signal, SignalHandler, StopOutcome};
use super::{Readiness, SubshellPty};
use crate::error::{Error, Result};

/// Name of the FIFO inside the session's private directory
const NOTIFY_FIFO_NAME: &str = "notify";

/// FIFO the shell's prompt hook writes its working directory to
pub struct NotifyFifo {
    path: PathBuf,
    file: File,
    pending: Vec<u8>,
}

impl NotifyFifo {
    /// Create the FIFO in `dir` and open it without blocking.
    ///
    /// Opened read-write so the open does not wait for a writer and the read
    /// end never sees end-of-file between prompts.
    pub fn create(dir: &Path) -> Result<Self> {
        let path = dir.join(NOTIFY_FIFO_NAME);
        mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|e| {
            Error::NotificationChannelFailed {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&path)
            .map_err(|e| Error::NotificationChannelFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path,
            file,
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next complete line written by the prompt hook, if any
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = [0u8; 1024];
        loop {
            match self.file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(Error::NotificationChannelFailed {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        match self.pending.iter().position(|b| *b == b'\n') {
            Some(end) => {
                let line: Vec<u8> = self.pending.drain(..=end).collect();
                let text = String::from_utf8_lossy(&line[..line.len() - 1]).to_string();
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }
}

/// A shell running on a real pseudoterminal
pub struct NativePty {
    // Owns master_fd
    _master: Box<dyn MasterPty + Send>,
    master_fd: RawFd,
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    signals: Option<SignalHandler>,
    notify: Option<NotifyFifo>,
    host_input: Option<File>,
    stop_timeout: Duration,
    exit_code: Option<i32>,
    // Holds the FIFO and init files; removed on drop
    _session_dir: Option<TempDir>,
}

impl NativePty {
    /// Assemble from a spawned pty.
    ///
    /// The slave side must already have been dropped so that the master
    /// reports end-of-file once the shell exits.
    pub fn new(
        master: Box<dyn MasterPty + Send>,
        child: Box<dyn Child + Send + Sync>,
        notify: Option<NotifyFifo>,
        session_dir: Option<TempDir>,
        stop_timeout: Duration,
    ) -> Result<Self> {
        let master_fd = master.as_raw_fd().ok_or_else(|| Error::PtyCreationFailed {
            command: "subshell".to_string(),
            reason: "pty master has no file descriptor".to_string(),
        })?;
        let reader = master
            .try_clone_reader()
            .map_err(|e| Error::PtyReaderCloneFailed {
                reason: e.to_string(),
            })?;
        let writer = master.take_writer().map_err(|e| Error::PtyWriterTakeFailed {
            reason: e.to_string(),
        })?;
        let signals = child.process_id().map(SignalHandler::new);

        // Unbuffered duplicate of stdin so poll readiness matches what read sees
        let host_input = match io::stdin().as_fd().try_clone_to_owned() {
            Ok(fd) => Some(File::from(fd)),
            Err(e) => {
                debug!("Host input unavailable: {}", e);
                None
            }
        };

        Ok(Self {
            _master: master,
            master_fd,
            reader,
            writer,
            child,
            signals,
            notify,
            host_input,
            stop_timeout,
            exit_code: None,
            _session_dir: session_dir,
        })
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Stop watching the host's stdin; keys are no longer forwarded
    pub fn detach_host_input(&mut self) {
        self.host_input = None;
    }

    fn master_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: master_fd belongs to self._master, which outlives the borrow
        unsafe { BorrowedFd::borrow_raw(self.master_fd) }
    }

    fn signal_handler(&self) -> Result<&SignalHandler> {
        self.signals.as_ref().ok_or(Error::NoPidAvailable)
    }
}

/// Poll timeout in milliseconds, clamped to what `PollTimeout` accepts
fn timeout_millis(timeout: Option<Duration>) -> Option<u16> {
    timeout.map(|d| u16::try_from(d.as_millis()).unwrap_or(u16::MAX))
}

fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
    match timeout_millis(timeout) {
        None => PollTimeout::NONE,
        Some(ms) => PollTimeout::from(ms),
    }
}

impl SubshellPty for NativePty {
    fn poll(&mut self, timeout: Option<Duration>, watch_host_input: bool) -> Result<Readiness> {
        let readable = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;

        let mut fds = vec![PollFd::new(self.master_fd(), PollFlags::POLLIN)];
        let notify_index = self.notify.as_ref().map(|notify| {
            fds.push(PollFd::new(notify.file.as_fd(), PollFlags::POLLIN));
            fds.len() - 1
        });
        let host_index = match (&self.host_input, watch_host_input) {
            (Some(input), true) => {
                fds.push(PollFd::new(input.as_fd(), PollFlags::POLLIN));
                Some(fds.len() - 1)
            }
            _ => None,
        };

        loop {
            match poll(&mut fds, poll_timeout(timeout)) {
                Ok(0) => return Ok(Readiness::TimedOut),
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    return Err(Error::PtyPollFailed {
                        reason: e.to_string(),
                    })
                }
            }
        }

        let is_ready = |index: usize| {
            fds[index]
                .revents()
                .is_some_and(|revents| revents.intersects(readable))
        };

        if is_ready(0) {
            Ok(Readiness::Output)
        } else if notify_index.is_some_and(is_ready) {
            Ok(Readiness::Notification)
        } else if host_index.is_some_and(is_ready) {
            Ok(Readiness::HostInput)
        } else {
            // POLLNVAL and friends: let the read report the error
            Ok(Readiness::Output)
        }
    }

    fn read_output(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    fn write_input(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush_input(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn read_notification(&mut self) -> Result<Option<String>> {
        match self.notify.as_mut() {
            Some(notify) => notify.next_line(),
            None => Ok(None),
        }
    }

    fn read_host_input(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.host_input.as_mut() {
            Some(input) => input.read(buf),
            None => Ok(0),
        }
    }

    fn child_alive(&mut self) -> bool {
        if self.exit_code.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_code = Some(status.exit_code() as i32);
                false
            }
            Err(e) => {
                debug!("Subshell status unavailable: {}", e);
                false
            }
        }
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn wait_for_stop(&mut self) -> Result<()> {
        let outcome = self.signal_handler()?.wait_for_stop(self.stop_timeout)?;
        match outcome {
            StopOutcome::Stopped => Ok(()),
            StopOutcome::Exited(code) => {
                self.exit_code = Some(code.unwrap_or(-1));
                Err(Error::SubshellDied { exit_code: code })
            }
        }
    }

    fn continue_shell(&mut self) -> Result<()> {
        self.signal_handler()?.send(Signal::Continue)
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        self.signal_handler()?.send(signal)
    }

    fn terminator_echo_len(&self) -> Option<usize> {
        let termios = tcgetattr(self.master_fd()).ok()?;
        let crlf = termios
            .output_flags
            .contains(OutputFlags::OPOST | OutputFlags::ONLCR);
        Some(if crlf { 2 } else { 1 })
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        if self.child_alive() {
            debug!("Killing subshell on drop");
            if let Err(e) = self.child.kill() {
                debug!("Failed to kill subshell: {}", e);
            }
        }
    }
}
