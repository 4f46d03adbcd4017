//! Byte accounting for the current command cycle
//!
//! Counts bytes read from the subshell and subtracts the bytes the host
//! itself injected, so that once a command completes the value is the
//! number of bytes the command produced. The value may go negative right
//! after a dispatch; anything `<= 0` means "no output".

/// Running count of genuine subshell output bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputByteCount {
    value: i64,
}

impl OutputByteCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new command cycle
    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Account for bytes read from the pty
    pub fn add_read(&mut self, n: usize) {
        self.value = self.value.saturating_add(to_i64(n));
    }

    /// Account for bytes written to the pty that the shell will echo back
    pub fn subtract_written(&mut self, n: usize) {
        self.value = self.value.saturating_sub(to_i64(n));
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Whether the command produced output of its own
    pub fn has_output(&self) -> bool {
        self.value > 0
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
