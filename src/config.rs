//! Stream options.

use crate::error::{AccelError, Result};

/// How a stream waits for job completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    /// Use the submission layer's blocking wait
    #[default]
    Blocking,
    /// Spin on the completion record
    BusyPoll,
}

/// Compression level advertised in the GZIP XFL byte.
///
/// The accelerator has a single compression mode, so the hint never changes
/// the encoded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelHint {
    #[default]
    Default,
    Best,
    Fastest,
}

impl LevelHint {
    pub fn xfl(self) -> u8 {
        match self {
            LevelHint::Default => 0,
            LevelHint::Best => 2,
            LevelHint::Fastest => 4,
        }
    }
}

/// Options for [`Deflate`](crate::Deflate) and [`Gzip`](crate::Gzip) streams
#[derive(Debug, Clone, Default)]
pub struct DeflateOptions {
    pub wait_mode: WaitMode,
    pub level_hint: LevelHint,
}

impl DeflateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_mode(mut self, mode: WaitMode) -> Self {
        self.wait_mode = mode;
        self
    }

    pub fn level_hint(mut self, hint: LevelHint) -> Self {
        self.level_hint = hint;
        self
    }
}

/// Default input buffer size of an [`Inflate`](crate::Inflate) stream.
pub const DEFAULT_INFLATE_BUFFER: usize = 4096;
/// Smallest accepted input buffer size.
pub const MIN_INFLATE_BUFFER: usize = 8;

/// Options for [`Inflate`](crate::Inflate) streams
#[derive(Debug, Clone)]
pub struct InflateOptions {
    /// Bytes pulled from the source per read
    pub buffer_size: usize,
    pub wait_mode: WaitMode,
}

impl Default for InflateOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_INFLATE_BUFFER,
            wait_mode: WaitMode::Blocking,
        }
    }
}

impl InflateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn wait_mode(mut self, mode: WaitMode) -> Self {
        self.wait_mode = mode;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.buffer_size < MIN_INFLATE_BUFFER {
            return Err(AccelError::BufferSizeTooSmall {
                size: self.buffer_size,
                min: MIN_INFLATE_BUFFER,
            });
        }
        Ok(())
    }
}
