use crate::{Error, Result};

/// Addressing mode for [`OutputBuffer::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Offset from the start of the output.
    Absolute,
    /// Offset measured backward from the discovered length.
    FromEnd,
    /// Offset from the current cursor.
    Relative,
}

impl SeekMode {
    /// Decode the seek kind passed across the guest boundary.
    ///
    /// Unknown kinds fall through to [`SeekMode::Relative`].
    pub fn from_raw(kind: i32) -> Self {
        match kind {
            0 => SeekMode::Absolute,
            1 => SeekMode::FromEnd,
            _ => SeekMode::Relative,
        }
    }
}

#[derive(Debug)]
enum Phase {
    Counting,
    Writing(Vec<u8>),
}

/// Two-pass output buffer driven by the guest.
///
/// During the counting pass only the extent of the output is tracked. A
/// single call to [`restart`](Self::restart) allocates exactly
/// [`discovered_length`](Self::discovered_length) zeroed bytes, after which
/// the guest replays its writes into the buffer.
///
/// `restart` must be called at most once per run. Calling it again discards
/// everything written so far; the guest is trusted not to do so.
#[derive(Debug)]
pub struct OutputBuffer {
    cursor: i64,
    discovered_length: i64,
    phase: Phase,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBuffer {
    /// Create a buffer in the counting phase.
    pub fn new() -> Self {
        Self {
            cursor: 0,
            discovered_length: 0,
            phase: Phase::Counting,
        }
    }

    /// Current write offset. May be negative after a `FromEnd` seek.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// High-water mark of every cursor position reached by a counting write.
    pub fn discovered_length(&self) -> u64 {
        self.discovered_length as u64
    }

    /// Whether `restart` has allocated the writing-pass buffer.
    pub fn is_materialized(&self) -> bool {
        matches!(self.phase, Phase::Writing(_))
    }

    /// Counting-pass write: advance the cursor and raise the high-water mark.
    pub fn count_write(&mut self, len: u64) -> u64 {
        self.cursor += len as i64;
        if self.cursor > self.discovered_length {
            self.discovered_length = self.cursor;
        }
        len
    }

    /// Move the cursor and return its new position.
    ///
    /// `FromEnd` is computed against the length discovered so far and is not
    /// clamped, so it can produce a negative cursor.
    pub fn seek(&mut self, mode: SeekMode, offset: i64) -> i64 {
        self.cursor = match mode {
            SeekMode::Absolute => offset,
            SeekMode::FromEnd => self.discovered_length - offset,
            SeekMode::Relative => self.cursor + offset,
        };
        self.cursor
    }

    /// Switch to the writing pass.
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.phase = Phase::Writing(vec![0; self.discovered_length as usize]);
    }

    /// Writing-pass write: copy `bytes` at the cursor and advance it.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let buffer = match &mut self.phase {
            Phase::Writing(buffer) => buffer,
            Phase::Counting => return Err(Error::NotMaterialized),
        };

        let cursor = self.cursor;
        let capacity = buffer.len();
        let out_of_bounds = || Error::WriteOutOfBounds {
            cursor,
            len: bytes.len(),
            capacity,
        };

        let start = usize::try_from(cursor).map_err(|_| out_of_bounds())?;
        let target = start
            .checked_add(bytes.len())
            .and_then(|end| buffer.get_mut(start..end))
            .ok_or_else(out_of_bounds)?;
        target.copy_from_slice(bytes);

        self.cursor += bytes.len() as i64;
        Ok(bytes.len())
    }

    /// Materialized bytes, if the writing pass has begun.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.phase {
            Phase::Writing(buffer) => Some(buffer),
            Phase::Counting => None,
        }
    }

    /// Consume the buffer and return the materialized bytes.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self.phase {
            Phase::Writing(buffer) => Some(buffer),
            Phase::Counting => None,
        }
    }
}
