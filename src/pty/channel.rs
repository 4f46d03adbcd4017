//! Subshell I/O Channel
//!
//! Byte-level bridge to the shell's pty. Every successful read is fed to the
//! [`OutputByteCount`]; writes run until the whole buffer is sent so the
//! caller can subtract exactly what the shell will echo.

use std::io;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;

use super::SubshellPty;
use crate::error::{Error, Result};
use crate::subshell::counter::OutputByteCount;

/// Default read buffer, the size of one pty line-discipline chunk
pub const DEFAULT_READ_BUFFER: usize = 4096;

/// Back-off before retrying an operation that would block
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Give up writing after this many consecutive would-block results
const MAX_WOULD_BLOCK_RETRIES: u32 = 100;

/// Result of one read from the pty master
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome<'a> {
    /// Bytes the shell produced, already counted
    Data(&'a [u8]),
    /// The slave side is closed
    EndOfFile,
}

/// Channel statistics for debug logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Total bytes read
    pub bytes_read: u64,
    /// Total bytes written
    pub bytes_written: u64,
    /// Number of successful reads
    pub read_operations: u64,
    /// Number of `write_all` calls that completed
    pub write_operations: u64,
    /// Interrupted or would-block operations that were retried
    pub retries: u64,
    /// Writes that needed more than one system call
    pub partial_writes: u64,
}

impl ChannelStats {
    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reads and writes the subshell's pty with retry semantics
pub struct SubshellChannel<P: SubshellPty> {
    pty: P,
    buffer: Vec<u8>,
    stats: ChannelStats,
}

impl<P: SubshellPty> SubshellChannel<P> {
    pub fn new(pty: P) -> Self {
        Self::with_buffer_size(pty, DEFAULT_READ_BUFFER)
    }

    pub fn with_buffer_size(pty: P, buffer_size: usize) -> Self {
        Self {
            pty,
            buffer: vec![0u8; buffer_size.max(1)],
            stats: ChannelStats::default(),
        }
    }

    /// Read whatever the pty master has and count it as output.
    ///
    /// Interrupted reads are retried silently. `EIO`, which Linux reports once
    /// the slave side is gone, is folded into [`ReadOutcome::EndOfFile`].
    pub fn read_available(&mut self, counter: &mut OutputByteCount) -> Result<ReadOutcome<'_>> {
        loop {
            match self.pty.read_output(&mut self.buffer) {
                Ok(0) => {
                    debug!("PTY read EOF");
                    return Ok(ReadOutcome::EndOfFile);
                }
                Ok(n) => {
                    counter.add_read(n);
                    self.stats.bytes_read += n as u64;
                    self.stats.read_operations += 1;
                    return Ok(ReadOutcome::Data(&self.buffer[..n]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    debug!("PTY read interrupted (EINTR), retrying...");
                    self.stats.retries += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.stats.retries += 1;
                    thread::sleep(RETRY_BACKOFF);
                }
                Err(e) if e.raw_os_error() == Some(Errno::EIO as i32) => {
                    debug!("PTY read EIO, slave side closed");
                    return Ok(ReadOutcome::EndOfFile);
                }
                Err(e) => {
                    return Err(Error::PtyReadFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Write the whole buffer, returning how many bytes were sent.
    ///
    /// Partial writes are continued, interrupted writes retried. Any other
    /// failure, or a write that accepts nothing, is fatal.
    pub fn write_all(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        let mut would_block = 0;

        while written < data.len() {
            match self.pty.write_input(&data[written..]) {
                Ok(0) => {
                    return Err(Error::PtyWriteFailed {
                        written,
                        requested: data.len(),
                        reason: "write accepted zero bytes".to_string(),
                    });
                }
                Ok(n) => {
                    written += n;
                    if written < data.len() {
                        self.stats.partial_writes += 1;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    debug!("PTY write interrupted (EINTR), retrying...");
                    self.stats.retries += 1;
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        && would_block < MAX_WOULD_BLOCK_RETRIES =>
                {
                    would_block += 1;
                    self.stats.retries += 1;
                    thread::sleep(RETRY_BACKOFF);
                }
                Err(e) => {
                    warn!("PTY write error ({}): {}", e.kind(), e);
                    return Err(Error::PtyWriteFailed {
                        written,
                        requested: data.len(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.pty.flush_input() {
            // Flush errors are usually not fatal
            debug!("PTY flush error: {}", e);
        }

        self.stats.bytes_written += written as u64;
        self.stats.write_operations += 1;
        Ok(written)
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn pty(&self) -> &P {
        &self.pty
    }

    pub fn pty_mut(&mut self) -> &mut P {
        &mut self.pty
    }

    pub fn into_inner(self) -> P {
        self.pty
    }
}
